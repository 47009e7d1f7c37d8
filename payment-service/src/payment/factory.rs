use std::collections::HashMap;
use std::sync::Arc;
use crate::config::settings::AppSettings;
use crate::models::enums::PaymentMethod;
use crate::payment::strategy::{PaymentGateway, RateLimitedGateway};
use crate::payment::providers::{momo::MomoGateway, vietqr::VietQrGateway};
use crate::error::PaymentError;

#[derive(Default)]
pub struct GatewayRegistry {
    gateways: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) -> &mut Self {
        self.gateways.insert(gateway.method(), gateway);
        self
    }

    /// 注册所有已配置的支付渠道，统一加限流封装
    pub fn from_settings(settings: &AppSettings) -> Result<Self, PaymentError> {
        let limit = settings.max_concurrent_gateway_calls.max(1);
        let mut registry = Self::new();

        let momo = Arc::new(MomoGateway::new(settings.momo.clone())?);
        registry.register(Arc::new(RateLimitedGateway::new(momo, limit)));

        let vietqr = Arc::new(VietQrGateway::new(settings.vietqr.clone()));
        registry.register(Arc::new(RateLimitedGateway::new(vietqr, limit)));

        // 银行卡渠道尚未接入，不注册

        Ok(registry)
    }

    pub fn get(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentGateway>, PaymentError> {
        self.gateways
            .get(&method)
            .cloned()
            .ok_or_else(|| PaymentError::UnsupportedPaymentMethod(method.to_string()))
    }
}
