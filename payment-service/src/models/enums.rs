use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
pub enum PaymentMethod {
    #[serde(rename = "MOMO")]
    #[strum(serialize = "MOMO")]
    Momo,
    #[serde(rename = "CARD")]
    #[strum(serialize = "CARD")]
    Card,
    #[serde(rename = "VIETQR")]
    #[strum(serialize = "VIETQR")]
    VietQr,
}

impl PaymentMethod {
    /// Prefix of the locally generated `transaction_ref`.
    pub fn ref_prefix(&self) -> &'static str {
        match self {
            Self::Momo => "MOMO",
            Self::Card => "CARD",
            Self::VietQr => "VQR",
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Momo => "MoMo",
            Self::Card => "Card",
            Self::VietQr => "VietQR",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Momo => "Ví điện tử MoMo",
            Self::Card => "Thẻ ngân hàng / thẻ quốc tế",
            Self::VietQr => "Chuyển khoản ngân hàng qua VietQR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum TransactionStatus {
    #[serde(rename = "PENDING")]
    #[strum(serialize = "PENDING")]
    Pending,
    #[serde(rename = "SUCCESS")]
    #[strum(serialize = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    #[strum(serialize = "FAILED")]
    Failed,
    #[serde(rename = "CANCELLED")]
    #[strum(serialize = "CANCELLED")]
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum OrderStatus {
    #[serde(rename = "PENDING")]
    #[strum(serialize = "PENDING")]
    Pending,
    #[serde(rename = "PAID")]
    #[strum(serialize = "PAID")]
    Paid,
}
