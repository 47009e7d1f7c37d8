use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySqlPool};
use std::str::FromStr;
use crate::domain::transaction::PaymentTransaction;
use crate::error::PaymentError;
use crate::models::enums::{PaymentMethod, TransactionStatus};

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<(), PaymentError>;
    async fn find_by_ref(&self, transaction_ref: &str) -> Result<Option<PaymentTransaction>, PaymentError>;
    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<PaymentTransaction>, PaymentError>;

    /// Writes the settled state of `transaction` only if the stored row is
    /// still in `from`. Returns whether the row was updated.
    async fn transition(&self, transaction: &PaymentTransaction, from: TransactionStatus) -> Result<bool, PaymentError>;

    async fn count_pending_for_order(&self, order_id: &str) -> Result<i64, PaymentError>;
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    payment_id: String,
    order_id: String,
    payment_method: String,
    amount: i64,
    status: String,
    payment_provider: String,
    transaction_ref: String,
    transaction_id: Option<String>,
    payment_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for PaymentTransaction {
    type Error = PaymentError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let payment_method = PaymentMethod::from_str(&row.payment_method)
            .map_err(|_| PaymentError::Internal(format!("unknown payment_method {}", row.payment_method)))?;
        let status = TransactionStatus::from_str(&row.status)
            .map_err(|_| PaymentError::Internal(format!("unknown transaction status {}", row.status)))?;

        Ok(PaymentTransaction {
            payment_id: row.payment_id,
            order_id: row.order_id,
            payment_method,
            amount: row.amount,
            status,
            payment_provider: row.payment_provider,
            transaction_ref: row.transaction_ref,
            transaction_id: row.transaction_id,
            payment_url: row.payment_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
            events: Vec::new(),
        })
    }
}

const SELECT_TRANSACTION: &str = r#"
    SELECT payment_id, order_id, payment_method, amount, status, payment_provider,
           transaction_ref, transaction_id, payment_url, created_at, updated_at
    FROM payment_transactions
"#;

pub struct MySqlTransactionRepository {
    pool: MySqlPool,
}

impl MySqlTransactionRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<PaymentTransaction>, PaymentError> {
        let sql = format!("{} WHERE {} = ?", SELECT_TRANSACTION, column);
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(PaymentTransaction::try_from).transpose()
    }
}

#[async_trait]
impl TransactionRepository for MySqlTransactionRepository {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions
            (payment_id, order_id, payment_method, amount, status, payment_provider,
             transaction_ref, transaction_id, payment_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
            .bind(&transaction.payment_id)
            .bind(&transaction.order_id)
            .bind(transaction.payment_method.to_string())
            .bind(transaction.amount)
            .bind(transaction.status.to_string())
            .bind(&transaction.payment_provider)
            .bind(&transaction.transaction_ref)
            .bind(&transaction.transaction_id)
            .bind(&transaction.payment_url)
            .bind(transaction.created_at)
            .bind(transaction.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_by_ref(&self, transaction_ref: &str) -> Result<Option<PaymentTransaction>, PaymentError> {
        self.find_one("transaction_ref", transaction_ref).await
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<PaymentTransaction>, PaymentError> {
        self.find_one("payment_id", payment_id).await
    }

    async fn transition(&self, transaction: &PaymentTransaction, from: TransactionStatus) -> Result<bool, PaymentError> {
        // 比较并交换：只有仍处于 from 状态的行会被更新
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = ?, transaction_id = COALESCE(?, transaction_id), updated_at = ?
            WHERE transaction_ref = ? AND status = ?
            "#
        )
            .bind(transaction.status.to_string())
            .bind(&transaction.transaction_id)
            .bind(transaction.updated_at)
            .bind(&transaction.transaction_ref)
            .bind(from.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn count_pending_for_order(&self, order_id: &str) -> Result<i64, PaymentError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM payment_transactions WHERE order_id = ? AND status = 'PENDING'"
        )
            .bind(order_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
