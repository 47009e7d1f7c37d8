mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;
use storefront_payment::models::enums::{OrderStatus, PaymentMethod, TransactionStatus};
use storefront_payment::models::order::OrderItem;

fn laptop() -> Vec<OrderItem> {
    vec![OrderItem { product_id: 11, quantity: 1, unit_price: 250000 }]
}

#[tokio::test]
async fn vietqr_create_stores_qr_url() {
    let app = TestApp::spawn(silent_mailer()).await;

    let (status, _, body) = app
        .post_json("/payment/vietqr/create", json!({ "orderId": "Q1", "amount": 250000 }))
        .await;

    assert_eq!(status, StatusCode::OK);
    let transaction_ref = body["transactionRef"].as_str().unwrap();
    assert!(transaction_ref.starts_with("VQR_Q1_"));
    let pay_url = body["payUrl"].as_str().unwrap();
    assert!(pay_url.starts_with("https://img.vietqr.io/image/970436-0011001234567-compact2.png?amount=250000"));
    assert!(pay_url.contains(&format!("addInfo={}", transaction_ref)));
    assert_eq!(body["qrCodeUrl"], body["payUrl"]);

    let row = app.transactions.by_ref(transaction_ref);
    assert_eq!(row.payment_method, PaymentMethod::VietQr);
    assert_eq!(row.payment_provider, "VietQR");
    assert_eq!(row.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn confirm_settles_pending_transfer() {
    let mut mailer = MockInvoiceMailer::new();
    mailer
        .expect_send_invoice_email()
        .withf(|order, _, recipient| order.order_id == "Q1" && recipient == "b@example.com")
        .times(1)
        .returning(|_, _, _| Ok(()));

    let app = TestApp::spawn(mailer).await;
    app.orders.seed_order("Q1", Some("b@example.com"), laptop());

    let (_, _, body) = app
        .post_json("/payment/vietqr/create", json!({ "orderId": "Q1", "amount": 250000 }))
        .await;
    let payment_id = body["paymentId"].as_str().unwrap().to_string();

    let (status, _, body) = app.get(&format!("/payment/transactions/{}", payment_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(body["data"]["orderId"], "Q1");

    let (status, _, body) = app
        .post_json(&format!("/payment/transactions/{}/confirm", payment_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "SUCCESS");
    assert_eq!(app.orders.order("Q1").unwrap().snapshot.status, OrderStatus::Paid);

    // 终态不能再确认
    let (status, _, body) = app
        .post_json(&format!("/payment/transactions/{}/confirm", payment_id), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "InvalidStateTransition");
}

#[tokio::test]
async fn cancel_releases_stock_once_no_attempt_is_pending() {
    let app = TestApp::spawn(silent_mailer()).await;
    app.orders.set_stock(11, 4);
    app.orders.seed_order("Q2", None, laptop());

    let mut payment_ids = Vec::new();
    for _ in 0..2 {
        let (status, _, body) = app
            .post_json("/payment/vietqr/create", json!({ "orderId": "Q2", "amount": 250000 }))
            .await;
        assert_eq!(status, StatusCode::OK);
        payment_ids.push(body["paymentId"].as_str().unwrap().to_string());
        // transaction_ref 以毫秒区分
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let (status, _, body) = app
        .post_json(&format!("/payment/transactions/{}/cancel", payment_ids[0]), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CANCELLED");
    // 还有一笔待支付，库存保持预留
    assert!(app.orders.order("Q2").unwrap().stock_reserved);
    assert_eq!(app.orders.stock(11), 4);

    app.post_json(&format!("/payment/transactions/{}/cancel", payment_ids[1]), json!({})).await;
    assert!(!app.orders.order("Q2").unwrap().stock_reserved);
    assert_eq!(app.orders.stock(11), 5);

    let (status, _, _) = app
        .post_json(&format!("/payment/transactions/{}/cancel", payment_ids[1]), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn new_attempt_reserves_released_stock_again() {
    let app = TestApp::spawn(silent_mailer()).await;
    app.orders.set_stock(11, 4);
    app.orders.seed_order("Q3", None, laptop());

    let (_, _, body) = app
        .post_json("/payment/vietqr/create", json!({ "orderId": "Q3", "amount": 250000 }))
        .await;
    let payment_id = body["paymentId"].as_str().unwrap().to_string();
    app.post_json(&format!("/payment/transactions/{}/cancel", payment_id), json!({})).await;
    assert_eq!(app.orders.stock(11), 5);

    let (status, _, _) = app
        .post_json("/payment/vietqr/create", json!({ "orderId": "Q3", "amount": 250000 }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(app.orders.order("Q3").unwrap().stock_reserved);
    assert_eq!(app.orders.stock(11), 4);
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let app = TestApp::spawn(silent_mailer()).await;

    let (status, _, body) = app.get("/payment/transactions/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "TransactionNotFound");

    let (status, _, _) = app
        .post_json("/payment/transactions/does-not-exist/confirm", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
