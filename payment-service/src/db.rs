use sqlx::{MySqlPool, mysql::MySqlPoolOptions};

pub async fn create_pool(database_url: &str) -> anyhow::Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

// 初始化数据库表
pub async fn init_db(pool: &MySqlPool) -> anyhow::Result<()> {
    // 支付流水，一次支付尝试一行，永不删除
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payment_transactions (
            payment_id VARCHAR(36) PRIMARY KEY,
            order_id VARCHAR(64) NOT NULL,
            payment_method VARCHAR(16) NOT NULL,
            amount BIGINT NOT NULL,
            status VARCHAR(16) NOT NULL,
            payment_provider VARCHAR(32) NOT NULL,
            transaction_ref VARCHAR(128) NOT NULL UNIQUE,
            transaction_id VARCHAR(64),
            payment_url TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            INDEX idx_order_status (order_id, status)
        )
        "#
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            order_id VARCHAR(64) PRIMARY KEY,
            customer_name VARCHAR(255),
            customer_phone VARCHAR(32),
            customer_email VARCHAR(255),
            shipping_address TEXT,
            total_amount BIGINT NOT NULL,
            status VARCHAR(16) NOT NULL DEFAULT 'PENDING',
            stock_reserved BOOLEAN NOT NULL DEFAULT FALSE,
            invoice_sent_at TIMESTAMP NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
        )
        "#
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS order_items (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            order_id VARCHAR(64) NOT NULL,
            product_id BIGINT NOT NULL,
            quantity INT NOT NULL,
            unit_price BIGINT NOT NULL,
            INDEX idx_order_id (order_id)
        )
        "#
    )
        .execute(pool)
        .await?;

    // 商品表只在这里用到库存字段
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            product_id BIGINT PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            stock INT NOT NULL DEFAULT 0
        )
        "#
    )
        .execute(pool)
        .await?;

    Ok(())
}
