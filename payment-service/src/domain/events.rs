use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use crate::models::enums::TransactionStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TransactionEvent {
    Created {
        transaction_ref: String,
        created_at: DateTime<Utc>,
    },
    Settled {
        transaction_ref: String,
        status: TransactionStatus,
        provider_transaction_id: Option<String>,
        settled_at: DateTime<Utc>,
    },
    Cancelled {
        transaction_ref: String,
        cancelled_at: DateTime<Utc>,
    },
}

impl TransactionEvent {
    pub fn transaction_ref(&self) -> &str {
        match self {
            Self::Created { transaction_ref, .. } => transaction_ref,
            Self::Settled { transaction_ref, .. } => transaction_ref,
            Self::Cancelled { transaction_ref, .. } => transaction_ref,
        }
    }

    pub fn event_time(&self) -> DateTime<Utc> {
        match self {
            Self::Created { created_at, .. } => *created_at,
            Self::Settled { settled_at, .. } => *settled_at,
            Self::Cancelled { cancelled_at, .. } => *cancelled_at,
        }
    }
}

pub fn apply_event(current_status: TransactionStatus, event: &TransactionEvent) -> Result<TransactionStatus, &'static str> {
    match (current_status, event) {
        (TransactionStatus::Pending, TransactionEvent::Created { .. }) => Ok(TransactionStatus::Pending),
        (TransactionStatus::Pending, TransactionEvent::Settled { status: TransactionStatus::Success, .. }) => Ok(TransactionStatus::Success),
        (TransactionStatus::Pending, TransactionEvent::Settled { status: TransactionStatus::Failed, .. }) => Ok(TransactionStatus::Failed),
        (TransactionStatus::Pending, TransactionEvent::Cancelled { .. }) => Ok(TransactionStatus::Cancelled),
        _ => Err("Invalid state transition"),
    }
}
