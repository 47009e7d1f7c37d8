#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use httpmock::prelude::*;
use mockall::mock;
use serde_json::{json, Value};
use tower::ServiceExt;

use storefront_payment::config::settings::{MomoConfig, VietQrConfig};
use storefront_payment::domain::signature::{canonical_string, sign, SETTLEMENT_FIELDS};
use storefront_payment::domain::transaction::PaymentTransaction;
use storefront_payment::models::enums::{OrderStatus, TransactionStatus};
use storefront_payment::models::order::{NewOrder, OrderItem, OrderSnapshot};
use storefront_payment::payment::factory::GatewayRegistry;
use storefront_payment::payment::providers::{momo::MomoGateway, vietqr::VietQrGateway};
use storefront_payment::repository::order_repository::OrderRepository;
use storefront_payment::repository::transaction_repository::TransactionRepository;
use storefront_payment::services::notification::{NotificationError, Notifier, PaymentSnapshot};
use storefront_payment::services::payment_service::{PaymentService, ServiceOptions};
use storefront_payment::{router, PaymentError};

pub const PARTNER_CODE: &str = "MOMOTEST";
pub const ACCESS_KEY: &str = "ak";
pub const SECRET_KEY: &str = "sk";
pub const DEEPLINK: &str = "storefront://payment-result";
pub const TRANS_ID: u64 = 4088878653;

mock! {
    pub InvoiceMailer {}

    #[async_trait]
    impl Notifier for InvoiceMailer {
        async fn send_invoice_email(
            &self,
            order: &OrderSnapshot,
            payment: &PaymentSnapshot,
            recipient: &str,
        ) -> Result<(), NotificationError>;
    }
}

/// A mailer that must never be called.
pub fn silent_mailer() -> MockInvoiceMailer {
    let mut mailer = MockInvoiceMailer::new();
    mailer.expect_send_invoice_email().never();
    mailer
}

#[derive(Default)]
pub struct InMemoryTransactions {
    rows: Mutex<Vec<PaymentTransaction>>,
}

impl InMemoryTransactions {
    pub fn all(&self) -> Vec<PaymentTransaction> {
        self.rows.lock().unwrap().clone()
    }

    pub fn by_ref(&self, transaction_ref: &str) -> PaymentTransaction {
        self.all()
            .into_iter()
            .find(|t| t.transaction_ref == transaction_ref)
            .expect("transaction stored")
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactions {
    async fn insert(&self, transaction: &PaymentTransaction) -> Result<(), PaymentError> {
        self.rows.lock().unwrap().push(transaction.clone());
        Ok(())
    }

    async fn find_by_ref(&self, transaction_ref: &str) -> Result<Option<PaymentTransaction>, PaymentError> {
        Ok(self.all().into_iter().find(|t| t.transaction_ref == transaction_ref))
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<PaymentTransaction>, PaymentError> {
        Ok(self.all().into_iter().find(|t| t.payment_id == payment_id))
    }

    async fn transition(&self, transaction: &PaymentTransaction, from: TransactionStatus) -> Result<bool, PaymentError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .find(|t| t.transaction_ref == transaction.transaction_ref && t.status == from)
        else {
            return Ok(false);
        };

        row.status = transaction.status;
        if transaction.transaction_id.is_some() {
            row.transaction_id = transaction.transaction_id.clone();
        }
        row.updated_at = transaction.updated_at;
        Ok(true)
    }

    async fn count_pending_for_order(&self, order_id: &str) -> Result<i64, PaymentError> {
        Ok(self
            .all()
            .iter()
            .filter(|t| t.order_id == order_id && t.status == TransactionStatus::Pending)
            .count() as i64)
    }
}

#[derive(Debug, Clone)]
pub struct StoredOrder {
    pub snapshot: OrderSnapshot,
    pub stock_reserved: bool,
    pub invoice_sent: bool,
}

#[derive(Default)]
pub struct InMemoryOrders {
    orders: Mutex<HashMap<String, StoredOrder>>,
    stock: Mutex<HashMap<i64, i32>>,
}

impl InMemoryOrders {
    pub fn set_stock(&self, product_id: i64, stock: i32) {
        self.stock.lock().unwrap().insert(product_id, stock);
    }

    pub fn stock(&self, product_id: i64) -> i32 {
        self.stock.lock().unwrap().get(&product_id).copied().unwrap_or_default()
    }

    /// Stores an order whose stock has already been taken.
    pub fn seed_order(&self, order_id: &str, email: Option<&str>, items: Vec<OrderItem>) {
        let total_amount = items.iter().map(|i| i.unit_price * i64::from(i.quantity)).sum();
        self.orders.lock().unwrap().insert(
            order_id.to_string(),
            StoredOrder {
                snapshot: OrderSnapshot {
                    order_id: order_id.to_string(),
                    customer_name: Some("Nguyễn Văn A".to_string()),
                    customer_email: email.map(str::to_string),
                    shipping_address: Some("1 Lê Lợi, Quận 1".to_string()),
                    total_amount,
                    status: OrderStatus::Pending,
                    items,
                },
                stock_reserved: true,
                invoice_sent: false,
            },
        );
    }

    pub fn order(&self, order_id: &str) -> Option<StoredOrder> {
        self.orders.lock().unwrap().get(order_id).cloned()
    }

    fn take(&self, items: &[OrderItem]) -> Result<(), PaymentError> {
        let mut stock = self.stock.lock().unwrap();
        if let Some(short) = items
            .iter()
            .find(|i| stock.get(&i.product_id).copied().unwrap_or_default() < i.quantity)
        {
            return Err(PaymentError::InsufficientStock { product_id: short.product_id });
        }
        for item in items {
            *stock.entry(item.product_id).or_default() -= item.quantity;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn find_status(&self, order_id: &str) -> Result<Option<OrderStatus>, PaymentError> {
        Ok(self.order(order_id).map(|o| o.snapshot.status))
    }

    async fn create_with_items(&self, order: &NewOrder) -> Result<(), PaymentError> {
        self.take(&order.items)?;
        self.orders.lock().unwrap().insert(
            order.order_id.clone(),
            StoredOrder {
                snapshot: OrderSnapshot {
                    order_id: order.order_id.clone(),
                    customer_name: order.customer_name.clone(),
                    customer_email: order.customer_email.clone(),
                    shipping_address: order.shipping_address.clone(),
                    total_amount: order.total_amount,
                    status: OrderStatus::Pending,
                    items: order.items.clone(),
                },
                stock_reserved: true,
                invoice_sent: false,
            },
        );
        Ok(())
    }

    async fn reserve_stock(&self, order_id: &str) -> Result<bool, PaymentError> {
        let Some(order) = self.order(order_id) else { return Ok(false) };
        if order.stock_reserved || order.snapshot.status == OrderStatus::Paid {
            return Ok(false);
        }
        self.take(&order.snapshot.items)?;
        if let Some(stored) = self.orders.lock().unwrap().get_mut(order_id) {
            stored.stock_reserved = true;
        }
        Ok(true)
    }

    async fn release_stock(&self, order_id: &str) -> Result<bool, PaymentError> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.get_mut(order_id) else { return Ok(false) };
        if !order.stock_reserved || order.snapshot.status == OrderStatus::Paid {
            return Ok(false);
        }
        order.stock_reserved = false;
        let mut stock = self.stock.lock().unwrap();
        for item in &order.snapshot.items {
            *stock.entry(item.product_id).or_default() += item.quantity;
        }
        Ok(true)
    }

    async fn mark_paid(&self, order_id: &str) -> Result<bool, PaymentError> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(order_id) {
            Some(order) if order.snapshot.status != OrderStatus::Paid => {
                order.snapshot.status = OrderStatus::Paid;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn claim_invoice(&self, order_id: &str) -> Result<bool, PaymentError> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(order_id) {
            Some(order) if !order.invoice_sent => {
                order.invoice_sent = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_snapshot(&self, order_id: &str) -> Result<Option<OrderSnapshot>, PaymentError> {
        Ok(self.order(order_id).map(|o| o.snapshot))
    }
}

pub fn momo_config(endpoint: &str) -> MomoConfig {
    MomoConfig {
        partner_code: PARTNER_CODE.to_string(),
        access_key: ACCESS_KEY.to_string(),
        secret_key: SECRET_KEY.to_string(),
        endpoint: endpoint.to_string(),
        redirect_url: "https://shop.test/payment/momo/callback".to_string(),
        ipn_url: "https://shop.test/payment/momo/ipn".to_string(),
        request_type: "captureWallet".to_string(),
        lang: "vi".to_string(),
        partner_name: "Storefront".to_string(),
        timeout_secs: 5,
    }
}

pub fn vietqr_config() -> VietQrConfig {
    VietQrConfig {
        image_base_url: "https://img.vietqr.io".to_string(),
        bank_id: "970436".to_string(),
        account_no: "0011001234567".to_string(),
        account_name: "CONG TY STOREFRONT".to_string(),
        template: "compact2".to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub provider: MockServer,
    pub transactions: Arc<InMemoryTransactions>,
    pub orders: Arc<InMemoryOrders>,
}

impl TestApp {
    pub async fn spawn(mailer: MockInvoiceMailer) -> Self {
        Self::spawn_with(mailer, |_| {}).await
    }

    pub async fn spawn_with(mailer: MockInvoiceMailer, configure: impl FnOnce(&mut MomoConfig)) -> Self {
        let provider = MockServer::start_async().await;
        let mut momo = momo_config(&provider.base_url());
        configure(&mut momo);

        let mut registry = GatewayRegistry::new();
        registry
            .register(Arc::new(MomoGateway::new(momo.clone()).unwrap()))
            .register(Arc::new(VietQrGateway::new(vietqr_config())));

        let transactions = Arc::new(InMemoryTransactions::default());
        let orders = Arc::new(InMemoryOrders::default());

        let service = PaymentService::new(
            transactions.clone(),
            orders.clone(),
            Arc::new(registry),
            Arc::new(mailer),
            ServiceOptions {
                result_deeplink: DEEPLINK.to_string(),
                momo_status: momo.status(),
            },
        );

        Self {
            router: router(Arc::new(service)),
            provider,
            transactions,
            orders,
        }
    }

    /// Makes the provider accept every create call with `https://pay/x`.
    pub async fn provider_accepts(&self) -> httpmock::Mock<'_> {
        self.provider
            .mock_async(|when, then| {
                when.method(POST).path("/v2/gateway/api/create");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(json!({
                        "partnerCode": PARTNER_CODE,
                        "resultCode": 0,
                        "message": "Thành công.",
                        "payUrl": "https://pay/x"
                    }));
            })
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, HeaderMap, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    /// Creates a MoMo payment and returns its `transactionRef`.
    pub async fn create_momo_payment(&self, order_id: &str, amount: i64) -> String {
        let (status, _, body) = self
            .post_json("/payment/momo/create", json!({ "orderId": order_id, "amount": amount }))
            .await;
        assert_eq!(status, StatusCode::OK, "create failed: {body}");
        body["transactionRef"].as_str().unwrap().to_string()
    }
}

fn settlement_signature(fields: &HashMap<String, String>) -> String {
    let canonical = canonical_string(&SETTLEMENT_FIELDS, |f| match f {
        "accessKey" => Some(ACCESS_KEY.to_string()),
        _ => fields.get(f).cloned(),
    });
    sign(&canonical, SECRET_KEY)
}

/// Query string of a correctly signed MoMo redirect.
pub fn signed_redirect_query(transaction_ref: &str, amount: i64, result_code: &str) -> String {
    let mut fields: HashMap<String, String> = [
        ("partnerCode", PARTNER_CODE.to_string()),
        ("orderId", transaction_ref.to_string()),
        ("requestId", transaction_ref.to_string()),
        ("amount", amount.to_string()),
        ("orderInfo", "Thanh toán đơn hàng".to_string()),
        ("orderType", "momo_wallet".to_string()),
        ("transId", TRANS_ID.to_string()),
        ("resultCode", result_code.to_string()),
        ("message", "Thành công.".to_string()),
        ("payType", "qr".to_string()),
        ("responseTime", "1700000001000".to_string()),
        ("extraData", String::new()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let signature = settlement_signature(&fields);
    fields.insert("signature".to_string(), signature);

    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter())
        .finish()
}

/// A correctly signed IPN body. Numbers are signed in their decimal form.
pub fn signed_ipn_body(transaction_ref: &str, amount: i64, result_code: Value) -> Value {
    let mut body = json!({
        "partnerCode": PARTNER_CODE,
        "orderId": transaction_ref,
        "requestId": transaction_ref,
        "amount": amount,
        "orderInfo": "Thanh toán đơn hàng",
        "orderType": "momo_wallet",
        "transId": TRANS_ID,
        "resultCode": result_code,
        "message": "Thành công.",
        "payType": "qr",
        "responseTime": 1700000001000u64,
        "extraData": ""
    });

    let fields: HashMap<String, String> = body
        .as_object()
        .unwrap()
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect();

    body["signature"] = json!(settlement_signature(&fields));
    body
}
