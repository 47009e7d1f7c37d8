use serde::{Deserialize, Serialize};

use super::enums::OrderStatus;
use super::payment::OrderData;
use crate::error::PaymentError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: i64,
}

/// Order row created together with a payment attempt when the shop has not
/// stored the order yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_id: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
    pub total_amount: i64,
    pub items: Vec<OrderItem>,
}

impl NewOrder {
    pub fn from_order_data(
        order_id: &str,
        total_amount: i64,
        customer_email: Option<&str>,
        data: &OrderData,
    ) -> Result<Self, PaymentError> {
        if data.items.is_empty() {
            return Err(PaymentError::Validation("orderData.items không được để trống".to_string()));
        }

        let items = data
            .items
            .iter()
            .map(|item| {
                if item.quantity <= 0 {
                    return Err(PaymentError::Validation(format!(
                        "Số lượng sản phẩm {} phải lớn hơn 0",
                        item.product_id
                    )));
                }
                Ok(OrderItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.price,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            order_id: order_id.to_string(),
            customer_name: data.customer_name.clone(),
            customer_phone: data.customer_phone.clone(),
            customer_email: data
                .customer_email
                .clone()
                .or_else(|| customer_email.map(str::to_string)),
            shipping_address: data.shipping_address.clone(),
            total_amount,
            items,
        })
    }
}

/// Read model handed to the invoice mail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub order_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
}
