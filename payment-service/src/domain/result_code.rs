use serde_json::Value;

use crate::models::enums::TransactionStatus;

/// MoMo's success result code.
pub const SUCCESS_RESULT_CODE: i64 = 0;

/// How a settlement reached us. The browser redirect carries `resultCode` as
/// a query string, the IPN as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultChannel {
    Redirect,
    Ipn,
}

pub fn parse_provider_result_code(raw: &Value, channel: ResultChannel) -> TransactionStatus {
    let succeeded = match channel {
        ResultChannel::Redirect => raw.as_str() == Some("0"),
        ResultChannel::Ipn => raw.as_i64() == Some(SUCCESS_RESULT_CODE),
    };

    if succeeded {
        TransactionStatus::Success
    } else {
        TransactionStatus::Failed
    }
}
