use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::settings::MomoConfig;
use crate::domain::settlement::SettlementNotice;
use crate::domain::signature::{self, canonical_string, CREATE_FIELDS, QUERY_FIELDS};
use crate::error::PaymentError;
use crate::models::enums::PaymentMethod;
use crate::payment::strategy::{GatewayPayment, GatewayPaymentRequest, PaymentGateway};

const CREATE_PATH: &str = "/v2/gateway/api/create";
const QUERY_PATH: &str = "/v2/gateway/api/query";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MomoCreateRequest<'a> {
    partner_code: &'a str,
    partner_name: &'a str,
    store_id: &'a str,
    request_id: &'a str,
    amount: i64,
    order_id: &'a str,
    order_info: &'a str,
    redirect_url: &'a str,
    ipn_url: &'a str,
    lang: &'a str,
    request_type: &'a str,
    auto_capture: bool,
    extra_data: &'a str,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MomoCreateResponse {
    result_code: i64,
    #[serde(default)]
    message: String,
    pay_url: Option<String>,
    deeplink: Option<String>,
    qr_code_url: Option<String>,
    request_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MomoQueryRequest<'a> {
    partner_code: &'a str,
    request_id: &'a str,
    order_id: &'a str,
    lang: &'a str,
    signature: String,
}

/// MoMo wallet gateway (API v2, captureWallet flow).
pub struct MomoGateway {
    config: MomoConfig,
    client: Client,
}

fn transport_error(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::GatewayTimeout
    } else {
        PaymentError::Http(err)
    }
}

impl MomoGateway {
    pub fn new(config: MomoConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(transport_error)?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// POSTs `body` and returns the parsed JSON answer of a 2xx response.
    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, PaymentError> {
        let url = self.url(path);
        debug!(url = %url, "calling MoMo");

        let response = self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        let parsed = serde_json::from_str::<Value>(&text).ok();

        if !status.is_success() {
            // 非 2xx 但带有业务错误码时按渠道拒绝处理
            let rejection = parsed.as_ref().and_then(|body| {
                body["resultCode"].as_i64().filter(|code| *code != 0).map(|code| (code, body))
            });
            if let Some((code, body)) = rejection {
                return Err(PaymentError::ProviderRejection {
                    code,
                    message: body["message"].as_str().unwrap_or_default().to_string(),
                });
            }
            return Err(PaymentError::ProviderStatus { status: status.as_u16(), body: text });
        }

        parsed.ok_or(PaymentError::ProviderStatus { status: status.as_u16(), body: text })
    }
}

#[async_trait]
impl PaymentGateway for MomoGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Momo
    }

    async fn create_payment(&self, request: &GatewayPaymentRequest) -> Result<GatewayPayment, PaymentError> {
        self.config.ensure_configured()?;

        let amount = request.amount.to_string();
        let canonical = canonical_string(&CREATE_FIELDS, |field| {
            let value = match field {
                "accessKey" => self.config.access_key.as_str(),
                "amount" => amount.as_str(),
                "extraData" => request.extra_data.as_str(),
                "ipnUrl" => self.config.ipn_url.as_str(),
                "orderId" => request.transaction_ref.as_str(),
                "orderInfo" => request.description.as_str(),
                "partnerCode" => self.config.partner_code.as_str(),
                "redirectUrl" => self.config.redirect_url.as_str(),
                "requestId" => request.transaction_ref.as_str(),
                "requestType" => self.config.request_type.as_str(),
                _ => return None,
            };
            Some(value.to_string())
        });

        let body = MomoCreateRequest {
            partner_code: &self.config.partner_code,
            partner_name: &self.config.partner_name,
            store_id: &self.config.partner_code,
            request_id: &request.transaction_ref,
            amount: request.amount,
            order_id: &request.transaction_ref,
            order_info: &request.description,
            redirect_url: &self.config.redirect_url,
            ipn_url: &self.config.ipn_url,
            lang: &self.config.lang,
            request_type: &self.config.request_type,
            auto_capture: true,
            extra_data: &request.extra_data,
            signature: signature::sign(&canonical, &self.config.secret_key),
        };

        let raw = self.post_json(CREATE_PATH, &body).await?;
        let response: MomoCreateResponse = serde_json::from_value(raw.clone())
            .map_err(|_| PaymentError::ProviderStatus { status: 200, body: raw.to_string() })?;

        if response.result_code != 0 {
            warn!(
                transaction_ref = %request.transaction_ref,
                result_code = response.result_code,
                message = %response.message,
                "MoMo rejected payment"
            );
            return Err(PaymentError::ProviderRejection {
                code: response.result_code,
                message: response.message,
            });
        }

        let pay_url = response
            .pay_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PaymentError::ProviderStatus { status: 200, body: raw.to_string() })?;

        info!(transaction_ref = %request.transaction_ref, "MoMo payment created");

        Ok(GatewayPayment {
            pay_url,
            deeplink: response.deeplink.filter(|v| !v.is_empty()),
            qr_code_url: response.qr_code_url.filter(|v| !v.is_empty()),
            provider_request_id: response.request_id.unwrap_or_else(|| request.transaction_ref.clone()),
        })
    }

    async fn query_status(&self, order_id: &str, request_id: &str) -> Result<Value, PaymentError> {
        self.config.ensure_configured()?;

        let canonical = canonical_string(&QUERY_FIELDS, |field| {
            let value = match field {
                "accessKey" => self.config.access_key.as_str(),
                "orderId" => order_id,
                "partnerCode" => self.config.partner_code.as_str(),
                "requestId" => request_id,
                _ => return None,
            };
            Some(value.to_string())
        });

        let body = MomoQueryRequest {
            partner_code: &self.config.partner_code,
            request_id,
            order_id,
            lang: &self.config.lang,
            signature: signature::sign(&canonical, &self.config.secret_key),
        };

        self.post_json(QUERY_PATH, &body).await
    }

    fn verify_settlement(&self, notice: &SettlementNotice) -> Result<(), PaymentError> {
        self.config.ensure_configured()?;

        let candidate = notice.signature().ok_or(PaymentError::SignatureMismatch)?;
        let canonical = notice.canonical(&self.config.access_key);

        if signature::verify(candidate, &canonical, &self.config.secret_key) {
            Ok(())
        } else {
            Err(PaymentError::SignatureMismatch)
        }
    }
}
