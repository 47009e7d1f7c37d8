use async_trait::async_trait;
use sqlx::{FromRow, MySqlConnection, MySqlPool};
use std::str::FromStr;
use tracing::debug;
use crate::error::PaymentError;
use crate::models::enums::OrderStatus;
use crate::models::order::{NewOrder, OrderItem, OrderSnapshot};

/// The slice of order persistence the payment flow mutates.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Current status of the order, `None` when there is no order record.
    async fn find_status(&self, order_id: &str) -> Result<Option<OrderStatus>, PaymentError>;

    /// Inserts the order and its items and reserves stock, all or nothing.
    async fn create_with_items(&self, order: &NewOrder) -> Result<(), PaymentError>;

    /// Reserves stock for an existing order whose reservation was released.
    /// Returns false when the order is already reserved or paid.
    async fn reserve_stock(&self, order_id: &str) -> Result<bool, PaymentError>;

    /// Gives reserved stock back unless the order is paid.
    async fn release_stock(&self, order_id: &str) -> Result<bool, PaymentError>;

    async fn mark_paid(&self, order_id: &str) -> Result<bool, PaymentError>;

    /// Claims the right to send the invoice mail; true for exactly one caller.
    async fn claim_invoice(&self, order_id: &str) -> Result<bool, PaymentError>;

    async fn find_snapshot(&self, order_id: &str) -> Result<Option<OrderSnapshot>, PaymentError>;
}

#[derive(Debug, FromRow)]
struct OrderRow {
    order_id: String,
    customer_name: Option<String>,
    customer_email: Option<String>,
    shipping_address: Option<String>,
    total_amount: i64,
    status: String,
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    product_id: i64,
    quantity: i32,
    unit_price: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

pub struct MySqlOrderRepository {
    pool: MySqlPool,
}

impl MySqlOrderRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

async fn load_items(conn: &mut MySqlConnection, order_id: &str) -> Result<Vec<OrderItem>, PaymentError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT product_id, quantity, unit_price FROM order_items WHERE order_id = ? ORDER BY id"
    )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

// 扣减库存，任一商品不足即返回错误，由调用方回滚事务
async fn take_stock(conn: &mut MySqlConnection, items: &[OrderItem]) -> Result<(), PaymentError> {
    for item in items {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - ? WHERE product_id = ? AND stock >= ?"
        )
            .bind(item.quantity)
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PaymentError::InsufficientStock { product_id: item.product_id });
        }
    }
    Ok(())
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn find_status(&self, order_id: &str) -> Result<Option<OrderStatus>, PaymentError> {
        let status = sqlx::query_scalar::<_, String>("SELECT status FROM orders WHERE order_id = ?")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        status
            .map(|s| {
                OrderStatus::from_str(&s).map_err(|_| PaymentError::Internal(format!("unknown order status {}", s)))
            })
            .transpose()
    }

    async fn create_with_items(&self, order: &NewOrder) -> Result<(), PaymentError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders
            (order_id, customer_name, customer_phone, customer_email, shipping_address,
             total_amount, status, stock_reserved)
            VALUES (?, ?, ?, ?, ?, ?, ?, TRUE)
            "#
        )
            .bind(&order.order_id)
            .bind(&order.customer_name)
            .bind(&order.customer_phone)
            .bind(&order.customer_email)
            .bind(&order.shipping_address)
            .bind(order.total_amount)
            .bind(OrderStatus::Pending.to_string())
            .execute(&mut *tx)
            .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price) VALUES (?, ?, ?, ?)"
            )
                .bind(&order.order_id)
                .bind(item.product_id)
                .bind(item.quantity)
                .bind(item.unit_price)
                .execute(&mut *tx)
                .await?;
        }

        // 库存不足时 tx 被丢弃，整体回滚
        take_stock(&mut tx, &order.items).await?;

        tx.commit().await?;
        debug!(order_id = %order.order_id, items = order.items.len(), "order created with stock reserved");
        Ok(())
    }

    async fn reserve_stock(&self, order_id: &str) -> Result<bool, PaymentError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE orders SET stock_reserved = TRUE
            WHERE order_id = ? AND stock_reserved = FALSE AND status <> 'PAID'
            "#
        )
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        if claimed.rows_affected() == 0 {
            return Ok(false);
        }

        let items = load_items(&mut tx, order_id).await?;
        take_stock(&mut tx, &items).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn release_stock(&self, order_id: &str) -> Result<bool, PaymentError> {
        let mut tx = self.pool.begin().await?;

        let released = sqlx::query(
            r#"
            UPDATE orders SET stock_reserved = FALSE
            WHERE order_id = ? AND stock_reserved = TRUE AND status <> 'PAID'
            "#
        )
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        if released.rows_affected() == 0 {
            return Ok(false);
        }

        let items = load_items(&mut tx, order_id).await?;
        for item in &items {
            sqlx::query("UPDATE products SET stock = stock + ? WHERE product_id = ?")
                .bind(item.quantity)
                .bind(item.product_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn mark_paid(&self, order_id: &str) -> Result<bool, PaymentError> {
        let result = sqlx::query("UPDATE orders SET status = 'PAID' WHERE order_id = ? AND status <> 'PAID'")
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn claim_invoice(&self, order_id: &str) -> Result<bool, PaymentError> {
        let result = sqlx::query(
            "UPDATE orders SET invoice_sent_at = NOW() WHERE order_id = ? AND invoice_sent_at IS NULL"
        )
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_snapshot(&self, order_id: &str) -> Result<Option<OrderSnapshot>, PaymentError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT order_id, customer_name, customer_email, shipping_address, total_amount, status
            FROM orders WHERE order_id = ?
            "#
        )
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status = OrderStatus::from_str(&row.status)
            .map_err(|_| PaymentError::Internal(format!("unknown order status {}", row.status)))?;
        let items = load_items(&mut conn, order_id).await?;

        Ok(Some(OrderSnapshot {
            order_id: row.order_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            shipping_address: row.shipping_address,
            total_amount: row.total_amount,
            status,
            items,
        }))
    }
}
