use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use storefront_payment::{config, db, handlers, payment, repository, services};
use storefront_payment::services::payment_service::{PaymentService, ServiceOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 设置日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_payment=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let settings = config::settings::AppSettings::from_env();
    if let Err(e) = settings.momo.ensure_configured() {
        tracing::warn!(error = %e, "MoMo credentials incomplete, MoMo payments will be refused");
    }

    // 初始化数据库连接池并建表
    let pool = db::create_pool(&settings.database_url).await?;
    db::init_db(&pool).await?;

    let transactions = Arc::new(repository::transaction_repository::MySqlTransactionRepository::new(pool.clone()));
    let orders = Arc::new(repository::order_repository::MySqlOrderRepository::new(pool));

    // 初始化支付渠道
    let gateways = Arc::new(payment::factory::GatewayRegistry::from_settings(&settings)?);
    let notifier = services::notification::notifier_from_settings(
        &settings.mail,
        Duration::from_secs(settings.gateway_timeout_secs),
    )?;

    let payment_service = Arc::new(PaymentService::new(
        transactions,
        orders,
        gateways,
        notifier,
        ServiceOptions {
            result_deeplink: settings.result_deeplink.clone(),
            momo_status: settings.momo.status(),
        },
    ));

    let app = handlers::router(payment_service);

    let addr: SocketAddr = format!("{}:{}", settings.server_host, settings.server_port).parse()?;
    tracing::info!("Payment service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
