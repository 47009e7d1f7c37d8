use async_trait::async_trait;
use std::sync::Arc;
use serde_json::Value;
use crate::error::PaymentError;
use crate::domain::settlement::SettlementNotice;
use crate::models::enums::PaymentMethod;

/// What the orchestrator hands a gateway when opening a payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPaymentRequest {
    /// The shop's order id, used in descriptions only.
    pub order_id: String,
    /// Sent to the provider as its order id; echoed back on settlement.
    pub transaction_ref: String,
    pub amount: i64,
    pub description: String,
    pub extra_data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub pay_url: String,
    pub deeplink: Option<String>,
    pub qr_code_url: Option<String>,
    pub provider_request_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// 创建支付，返回跳转地址
    async fn create_payment(&self, request: &GatewayPaymentRequest) -> Result<GatewayPayment, PaymentError>;

    /// 向渠道查询支付状态，原样返回渠道报文
    async fn query_status(&self, _order_id: &str, _request_id: &str) -> Result<Value, PaymentError> {
        Err(PaymentError::UnsupportedOperation(format!(
            "{} không hỗ trợ tra cứu trạng thái",
            self.method().provider_name()
        )))
    }

    /// 校验回调签名
    fn verify_settlement(&self, _notice: &SettlementNotice) -> Result<(), PaymentError> {
        Err(PaymentError::UnsupportedOperation(format!(
            "{} không có kênh thông báo kết quả",
            self.method().provider_name()
        )))
    }
}

// 限流装饰器
pub struct RateLimitedGateway<T: PaymentGateway + ?Sized> {
    inner: Arc<T>,
    limiter: Arc<tokio::sync::Semaphore>,
}

impl<T: PaymentGateway + ?Sized> RateLimitedGateway<T> {
    pub fn new(inner: Arc<T>, max_concurrent: usize) -> Self {
        Self {
            inner,
            limiter: Arc::new(tokio::sync::Semaphore::new(max_concurrent)),
        }
    }
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for RateLimitedGateway<T> {
    fn method(&self) -> PaymentMethod {
        self.inner.method()
    }

    async fn create_payment(&self, request: &GatewayPaymentRequest) -> Result<GatewayPayment, PaymentError> {
        let _permit = self.limiter.try_acquire()
            .map_err(|_| PaymentError::RateLimited)?;

        self.inner.create_payment(request).await
    }

    async fn query_status(&self, order_id: &str, request_id: &str) -> Result<Value, PaymentError> {
        let _permit = self.limiter.try_acquire()
            .map_err(|_| PaymentError::RateLimited)?;

        self.inner.query_status(order_id, request_id).await
    }

    fn verify_settlement(&self, notice: &SettlementNotice) -> Result<(), PaymentError> {
        // 回调校验不限流
        self.inner.verify_settlement(notice)
    }
}
