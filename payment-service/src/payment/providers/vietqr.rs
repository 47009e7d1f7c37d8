use async_trait::async_trait;
use url::Url;

use crate::config::settings::VietQrConfig;
use crate::error::PaymentError;
use crate::models::enums::PaymentMethod;
use crate::payment::strategy::{GatewayPayment, GatewayPaymentRequest, PaymentGateway};

/// Bank transfer through a VietQR image. Nothing is called remotely: the QR
/// encodes the receiving account, the amount and our `transaction_ref` as the
/// transfer note. Transfers are confirmed administratively.
pub struct VietQrGateway {
    config: VietQrConfig,
}

impl VietQrGateway {
    pub fn new(config: VietQrConfig) -> Self {
        Self { config }
    }

    fn qr_url(&self, request: &GatewayPaymentRequest) -> Result<Url, PaymentError> {
        let base = format!(
            "{}/image/{}-{}-{}.png",
            self.config.image_base_url.trim_end_matches('/'),
            self.config.bank_id.trim(),
            self.config.account_no.trim(),
            self.config.template,
        );

        let mut url = Url::parse(&base)
            .map_err(|e| PaymentError::Configuration(format!("VIETQR_IMAGE_BASE_URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("amount", &request.amount.to_string());
            query.append_pair("addInfo", &request.transaction_ref);
            if !self.config.account_name.trim().is_empty() {
                query.append_pair("accountName", self.config.account_name.trim());
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl PaymentGateway for VietQrGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::VietQr
    }

    async fn create_payment(&self, request: &GatewayPaymentRequest) -> Result<GatewayPayment, PaymentError> {
        self.config.ensure_configured()?;

        let url = self.qr_url(request)?.to_string();

        Ok(GatewayPayment {
            pay_url: url.clone(),
            deeplink: None,
            qr_code_url: Some(url),
            provider_request_id: request.transaction_ref.clone(),
        })
    }
}
