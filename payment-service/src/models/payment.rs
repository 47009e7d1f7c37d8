use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub order_description: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub order_data: Option<OrderData>,
}

impl CreatePaymentRequest {
    /// Returns the required `(orderId, amount)` pair.
    pub fn validate(&self) -> Result<(String, i64), PaymentError> {
        let order_id = self
            .order_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PaymentError::Validation("Thiếu mã đơn hàng (orderId)".to_string()))?;

        let amount = self
            .amount
            .ok_or_else(|| PaymentError::Validation("Thiếu số tiền thanh toán (amount)".to_string()))?;

        if amount <= 0 {
            return Err(PaymentError::Validation("Số tiền thanh toán phải lớn hơn 0".to_string()));
        }

        Ok((order_id.to_string(), amount))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    pub product_id: i64,
    pub quantity: i32,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub success: bool,
    pub payment_id: String,
    pub pay_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deeplink: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
    pub transaction_ref: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl CheckStatusRequest {
    pub fn validate(&self) -> Result<(String, String), PaymentError> {
        let non_empty = |value: &Option<String>| {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        };

        let order_id = non_empty(&self.order_id)
            .ok_or_else(|| PaymentError::Validation("Thiếu orderId".to_string()))?;
        let request_id = non_empty(&self.request_id)
            .ok_or_else(|| PaymentError::Validation("Thiếu requestId".to_string()))?;

        Ok((order_id, request_id))
    }
}

/// Which MoMo credentials are present. Never carries the values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomoConfigStatus {
    pub configured: bool,
    pub partner_code: bool,
    pub access_key: bool,
    pub secret_key: bool,
    pub redirect_url: bool,
    pub ipn_url: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpnAck {
    pub message: String,
}

impl IpnAck {
    pub fn success() -> Self {
        Self { message: "Success".to_string() }
    }
}
