use chrono::{DateTime, Utc};
use uuid::Uuid;
use serde::{Serialize, Deserialize};
use crate::models::enums::{PaymentMethod, TransactionStatus};
use crate::domain::events::{TransactionEvent, apply_event};
use crate::error::PaymentError;

/// One payment attempt against a provider. `transaction_ref` is unique and is
/// the key every settlement is matched on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub payment_id: String,
    pub order_id: String,
    pub payment_method: PaymentMethod,
    pub amount: i64,
    pub status: TransactionStatus,
    pub payment_provider: String,
    pub transaction_ref: String,
    pub transaction_id: Option<String>,
    pub payment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // 本次处理中产生的事件，不落库
    #[serde(skip)]
    pub(crate) events: Vec<TransactionEvent>,
}

impl PaymentTransaction {
    pub fn new_pending(
        order_id: &str,
        payment_method: PaymentMethod,
        amount: i64,
        transaction_ref: String,
        payment_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        // 新建即为 PENDING，创建事件直接入列
        let created = TransactionEvent::Created {
            transaction_ref: transaction_ref.clone(),
            created_at: now,
        };

        Self {
            payment_id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            payment_method,
            amount,
            status: TransactionStatus::Pending,
            payment_provider: payment_method.provider_name().to_string(),
            transaction_ref,
            transaction_id: None,
            payment_url,
            created_at: now,
            updated_at: now,
            events: vec![created],
        }
    }

    pub fn apply_event(&mut self, event: TransactionEvent) -> Result<(), PaymentError> {
        if event.transaction_ref() != self.transaction_ref {
            return Err(PaymentError::InvalidEvent {
                transaction_ref: self.transaction_ref.clone(),
                event_ref: event.transaction_ref().to_string(),
            });
        }

        match apply_event(self.status, &event) {
            Ok(new_status) => {
                self.status = new_status;
                self.updated_at = event.event_time();

                if let TransactionEvent::Settled { provider_transaction_id: Some(id), .. } = &event {
                    self.transaction_id = Some(id.clone());
                }

                self.events.push(event);
                Ok(())
            }
            Err(_) => Err(PaymentError::InvalidStateTransition {
                from: self.status,
                event: format!("{:?}", event),
            }),
        }
    }

    /// Moves a PENDING attempt to SUCCESS or FAILED.
    pub fn settle(&mut self, status: TransactionStatus, provider_transaction_id: Option<String>) -> Result<(), PaymentError> {
        self.apply_event(TransactionEvent::Settled {
            transaction_ref: self.transaction_ref.clone(),
            status,
            provider_transaction_id,
            settled_at: Utc::now(),
        })
    }

    pub fn cancel(&mut self) -> Result<(), PaymentError> {
        self.apply_event(TransactionEvent::Cancelled {
            transaction_ref: self.transaction_ref.clone(),
            cancelled_at: Utc::now(),
        })
    }

    pub fn events(&self) -> &[TransactionEvent] {
        &self.events
    }
}
