use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::error::PaymentError;
use crate::models::enums::PaymentMethod;
use crate::models::payment::{CheckStatusRequest, CreatePaymentRequest, IpnAck};
use crate::services::payment_service::PaymentService;

pub fn router(service: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/payment/momo/create", post(create_momo_payment))
        .route("/payment/momo/callback", get(momo_callback))
        .route("/payment/momo/ipn", post(momo_ipn))
        .route("/payment/momo/check-status", post(check_momo_status))
        .route("/payment/momo/config", get(momo_config))
        .route("/payment/vietqr/create", post(create_vietqr_payment))
        .route("/payment/transactions/{payment_id}", get(get_transaction))
        .route("/payment/transactions/{payment_id}/confirm", post(confirm_transaction))
        .route("/payment/transactions/{payment_id}/cancel", post(cancel_transaction))
        .fallback(handler_404)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(Extension(service)),
        )
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "success": false, "message": "Không tìm thấy đường dẫn" })))
}

fn invalid_body(rejection: JsonRejection) -> PaymentError {
    PaymentError::Validation(rejection.body_text())
}

async fn create_payment(
    service: &PaymentService,
    method: PaymentMethod,
    payload: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return invalid_body(rejection).into_response(),
    };

    match service.create_payment(method, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn create_momo_payment(
    Extension(service): Extension<Arc<PaymentService>>,
    payload: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Response {
    create_payment(&service, PaymentMethod::Momo, payload).await
}

pub async fn create_vietqr_payment(
    Extension(service): Extension<Arc<PaymentService>>,
    payload: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Response {
    create_payment(&service, PaymentMethod::VietQr, payload).await
}

/// Browser redirect from MoMo. Sends the payer on to the app deep link.
pub async fn momo_callback(
    Extension(service): Extension<Arc<PaymentService>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match service.handle_redirect(params).await {
        Ok(location) => Redirect::to(&location).into_response(),
        Err(e @ (PaymentError::SignatureMismatch | PaymentError::Validation(_))) => e.into_response(),
        Err(e) => {
            warn!(error = %e, "redirect settlement failed");
            Redirect::to(&service.failure_redirect()).into_response()
        }
    }
}

/// Server-to-server notification. MoMo only needs the acknowledgement, so
/// every outcome answers 204.
pub async fn momo_ipn(
    Extension(service): Extension<Arc<PaymentService>>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> impl IntoResponse {
    match payload {
        Ok(Json(body)) => match service.handle_ipn(body).await {
            Ok(outcome) => debug!(
                transaction_ref = %outcome.transaction.transaction_ref,
                status = %outcome.transaction.status,
                applied = outcome.applied,
                "IPN processed"
            ),
            Err(e) => error!(error = %e, "IPN processing failed"),
        },
        Err(rejection) => warn!(error = %rejection.body_text(), "IPN body rejected"),
    }

    (StatusCode::NO_CONTENT, Json(IpnAck::success()))
}

pub async fn check_momo_status(
    Extension(service): Extension<Arc<PaymentService>>,
    payload: Result<Json<CheckStatusRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return invalid_body(rejection).into_response(),
    };

    match service.check_status(request).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn momo_config(Extension(service): Extension<Arc<PaymentService>>) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": service.momo_config_status() }))).into_response()
}

pub async fn get_transaction(
    Extension(service): Extension<Arc<PaymentService>>,
    Path(payment_id): Path<String>,
) -> Response {
    match service.find_transaction(&payment_id).await {
        Ok(transaction) => (StatusCode::OK, Json(json!({ "success": true, "data": transaction }))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn confirm_transaction(
    Extension(service): Extension<Arc<PaymentService>>,
    Path(payment_id): Path<String>,
) -> Response {
    match service.confirm_transaction(&payment_id).await {
        Ok(transaction) => (StatusCode::OK, Json(json!({ "success": true, "data": transaction }))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn cancel_transaction(
    Extension(service): Extension<Arc<PaymentService>>,
    Path(payment_id): Path<String>,
) -> Response {
    match service.cancel_transaction(&payment_id).await {
        Ok(transaction) => (StatusCode::OK, Json(json!({ "success": true, "data": transaction }))).into_response(),
        Err(e) => e.into_response(),
    }
}
