use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::domain::result_code::{parse_provider_result_code, ResultChannel};
use crate::domain::signature::{canonical_string, SETTLEMENT_FIELDS};
use crate::models::enums::TransactionStatus;

/// A provider's claim about the outcome of one attempt, as received on either
/// the browser redirect or the server-to-server IPN.
#[derive(Debug, Clone)]
pub struct SettlementNotice {
    channel: ResultChannel,
    fields: BTreeMap<String, String>,
    result_code: Value,
}

fn value_to_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl SettlementNotice {
    pub fn from_redirect(params: HashMap<String, String>) -> Self {
        let result_code = params
            .get("resultCode")
            .map(|code| Value::String(code.clone()))
            .unwrap_or(Value::Null);

        Self {
            channel: ResultChannel::Redirect,
            fields: params.into_iter().collect(),
            result_code,
        }
    }

    pub fn from_ipn(body: Map<String, Value>) -> Self {
        let result_code = body.get("resultCode").cloned().unwrap_or(Value::Null);
        let fields = body
            .iter()
            .map(|(key, value)| (key.clone(), value_to_field(value)))
            .collect();

        Self {
            channel: ResultChannel::Ipn,
            fields,
            result_code,
        }
    }

    pub fn channel(&self) -> ResultChannel {
        self.channel
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Our `transaction_ref`, echoed back by MoMo as `orderId`.
    pub fn transaction_ref(&self) -> Option<&str> {
        self.field("orderId").filter(|v| !v.is_empty())
    }

    pub fn provider_transaction_id(&self) -> Option<String> {
        self.field("transId").filter(|v| !v.is_empty()).map(str::to_string)
    }

    pub fn signature(&self) -> Option<&str> {
        self.field("signature")
    }

    pub fn amount(&self) -> Option<i64> {
        self.field("amount").and_then(|v| v.trim().parse().ok())
    }

    /// Settlement canonical string. `accessKey` is ours and never taken
    /// from the notice.
    pub fn canonical(&self, access_key: &str) -> String {
        canonical_string(&SETTLEMENT_FIELDS, |f| match f {
            "accessKey" => Some(access_key.to_string()),
            _ => self.fields.get(f).cloned(),
        })
    }

    /// Outcome claimed by the provider, interpreted per channel.
    pub fn status(&self) -> TransactionStatus {
        parse_provider_result_code(&self.result_code, self.channel)
    }
}
