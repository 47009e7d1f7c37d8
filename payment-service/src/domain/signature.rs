//! HMAC-SHA256 signing over MoMo canonical strings.
//!
//! A canonical string is the `&`-joined `key=value` list over a fixed field
//! order. The order is part of the provider contract; absent fields are kept
//! as `key=` so the string layout never changes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Fields signed when creating a payment.
pub const CREATE_FIELDS: [&str; 10] = [
    "accessKey",
    "amount",
    "extraData",
    "ipnUrl",
    "orderId",
    "orderInfo",
    "partnerCode",
    "redirectUrl",
    "requestId",
    "requestType",
];

/// Fields signed by the provider on the redirect callback and on the IPN.
pub const SETTLEMENT_FIELDS: [&str; 13] = [
    "accessKey",
    "amount",
    "extraData",
    "message",
    "orderId",
    "orderInfo",
    "orderType",
    "partnerCode",
    "payType",
    "requestId",
    "responseTime",
    "resultCode",
    "transId",
];

/// Fields signed when querying a payment status.
pub const QUERY_FIELDS: [&str; 4] = ["accessKey", "orderId", "partnerCode", "requestId"];

pub fn canonical_string<F>(fields: &[&str], lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    fields
        .iter()
        .map(|field| format!("{}={}", field, lookup(field).unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("&")
}

fn keyed_mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Lowercase hex HMAC-SHA256 of `canonical` under `secret`.
pub fn sign(canonical: &str, secret: &str) -> String {
    let mut mac = keyed_mac(secret);
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify(candidate: &str, canonical: &str, secret: &str) -> bool {
    // 只接受 sign() 的输出形式（小写 hex）
    if !candidate.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return false;
    }
    let Ok(expected) = hex::decode(candidate) else {
        return false;
    };

    let mut mac = keyed_mac(secret);
    mac.update(canonical.as_bytes());
    mac.verify_slice(&expected).is_ok()
}
