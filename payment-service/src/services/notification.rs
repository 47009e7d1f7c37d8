use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::settings::MailConfig;
use crate::domain::money::Money;
use crate::domain::transaction::PaymentTransaction;
use crate::models::enums::PaymentMethod;
use crate::models::order::OrderSnapshot;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Không gửi được email: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Máy chủ email trả về HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Địa chỉ email không hợp lệ: {0}")]
    InvalidRecipient(String),
}

/// Payment details printed on the invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSnapshot {
    pub payment_id: String,
    pub transaction_ref: String,
    pub transaction_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub amount: i64,
    pub paid_at: DateTime<Utc>,
}

impl From<&PaymentTransaction> for PaymentSnapshot {
    fn from(transaction: &PaymentTransaction) -> Self {
        Self {
            payment_id: transaction.payment_id.clone(),
            transaction_ref: transaction.transaction_ref.clone(),
            transaction_id: transaction.transaction_id.clone(),
            payment_method: transaction.payment_method,
            amount: transaction.amount,
            paid_at: transaction.updated_at,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_invoice_email(
        &self,
        order: &OrderSnapshot,
        payment: &PaymentSnapshot,
        recipient: &str,
    ) -> Result<(), NotificationError>;
}

pub struct RenderedInvoice {
    pub subject: String,
    pub text: String,
}

pub fn render_invoice(order: &OrderSnapshot, payment: &PaymentSnapshot) -> RenderedInvoice {
    let mut lines = vec![
        format!("Xin chào {},", order.customer_name.as_deref().unwrap_or("quý khách")),
        String::new(),
        format!("Đơn hàng {} đã được thanh toán thành công.", order.order_id),
        String::new(),
    ];

    for item in &order.items {
        let unit = Money::vnd(item.unit_price);
        lines.push(format!(
            "- Sản phẩm #{} x{}: {} ({} / sản phẩm)",
            item.product_id,
            item.quantity,
            unit.times(item.quantity),
            unit
        ));
    }

    lines.push(String::new());
    lines.push(format!("Tổng tiền: {}", Money::vnd(payment.amount)));
    lines.push(format!("Phương thức: {}", payment.payment_method.description()));
    lines.push(format!("Mã giao dịch: {}", payment.transaction_ref));
    if let Some(id) = &payment.transaction_id {
        lines.push(format!("Mã giao dịch nhà cung cấp: {}", id));
    }
    lines.push(format!("Thời gian: {}", payment.paid_at.format("%d/%m/%Y %H:%M:%S UTC")));
    if let Some(address) = &order.shipping_address {
        lines.push(format!("Giao đến: {}", address));
    }

    RenderedInvoice {
        subject: format!("Hóa đơn thanh toán đơn hàng {}", order.order_id),
        text: lines.join("\n"),
    }
}

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Sends invoices through an HTTP mail relay.
pub struct MailApiNotifier {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl MailApiNotifier {
    pub fn new(api_url: String, api_key: Option<String>, from: String, timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_url, api_key, from })
    }
}

#[async_trait]
impl Notifier for MailApiNotifier {
    async fn send_invoice_email(
        &self,
        order: &OrderSnapshot,
        payment: &PaymentSnapshot,
        recipient: &str,
    ) -> Result<(), NotificationError> {
        if !recipient.contains('@') {
            return Err(NotificationError::InvalidRecipient(recipient.to_string()));
        }

        let invoice = render_invoice(order, payment);
        let mut request = self.client.post(&self.api_url).json(&MailRequest {
            from: &self.from,
            to: recipient,
            subject: &invoice.subject,
            text: &invoice.text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Status { status: status.as_u16(), body });
        }

        info!(order_id = %order.order_id, "invoice email sent");
        Ok(())
    }
}

/// Used when no mail relay is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_invoice_email(
        &self,
        order: &OrderSnapshot,
        payment: &PaymentSnapshot,
        recipient: &str,
    ) -> Result<(), NotificationError> {
        let invoice = render_invoice(order, payment);
        info!(order_id = %order.order_id, recipient, subject = %invoice.subject, "mail relay not configured, invoice logged only");
        Ok(())
    }
}

pub fn notifier_from_settings(mail: &MailConfig, timeout: Duration) -> Result<Arc<dyn Notifier>, NotificationError> {
    match &mail.api_url {
        Some(url) => Ok(Arc::new(MailApiNotifier::new(
            url.clone(),
            mail.api_key.clone(),
            mail.from.clone(),
            timeout,
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}
