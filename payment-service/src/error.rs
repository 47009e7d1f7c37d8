use axum::{response::{IntoResponse, Response}, http::StatusCode, Json};
use serde_json::json;
use thiserror::Error;
use crate::models::enums::TransactionStatus;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Dữ liệu không hợp lệ: {0}")]
    Validation(String),

    #[error("Cổng thanh toán chưa được cấu hình đầy đủ: {0}")]
    Configuration(String),

    #[error("Chữ ký giao dịch không hợp lệ")]
    SignatureMismatch,

    #[error("Cổng thanh toán từ chối giao dịch: {message} (mã {code})")]
    ProviderRejection { code: i64, message: String },

    #[error("Không thể kết nối cổng thanh toán: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cổng thanh toán trả về HTTP {status}")]
    ProviderStatus { status: u16, body: String },

    #[error("Cổng thanh toán không phản hồi trong thời gian cho phép")]
    GatewayTimeout,

    #[error("Lỗi cơ sở dữ liệu: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Không tìm thấy giao dịch: {0}")]
    TransactionNotFound(String),

    #[error("Không tìm thấy đơn hàng: {0}")]
    OrderNotFound(String),

    #[error("Đơn hàng {0} đã được thanh toán")]
    OrderAlreadyPaid(String),

    #[error("Không thể chuyển trạng thái giao dịch: hiện tại {from}, sự kiện {event}")]
    InvalidStateTransition {
        from: TransactionStatus,
        event: String,
    },

    #[error("Sự kiện không hợp lệ: giao dịch {transaction_ref} nhận sự kiện của {event_ref}")]
    InvalidEvent {
        transaction_ref: String,
        event_ref: String,
    },

    #[error("Sản phẩm {product_id} không đủ tồn kho")]
    InsufficientStock { product_id: i64 },

    #[error("Phương thức thanh toán không được hỗ trợ: {0}")]
    UnsupportedPaymentMethod(String),

    #[error("Thao tác không được hỗ trợ: {0}")]
    UnsupportedOperation(String),

    #[error("Hệ thống thanh toán đang bận, vui lòng thử lại sau")]
    RateLimited,

    #[error("Lỗi hệ thống: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Validation(_)
            | PaymentError::SignatureMismatch
            | PaymentError::ProviderRejection { .. }
            | PaymentError::UnsupportedPaymentMethod(_)
            | PaymentError::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
            PaymentError::TransactionNotFound(_) | PaymentError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::InvalidStateTransition { .. }
            | PaymentError::InsufficientStock { .. }
            | PaymentError::OrderAlreadyPaid(_) => StatusCode::CONFLICT,
            PaymentError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            PaymentError::Configuration(_)
            | PaymentError::Http(_)
            | PaymentError::ProviderStatus { .. }
            | PaymentError::GatewayTimeout
            | PaymentError::Database(_)
            | PaymentError::InvalidEvent { .. }
            | PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "ValidationError",
            PaymentError::Configuration(_) => "ConfigurationError",
            PaymentError::SignatureMismatch => "SignatureMismatchError",
            PaymentError::ProviderRejection { .. } => "ProviderRejection",
            PaymentError::Http(_) | PaymentError::ProviderStatus { .. } => "TransportError",
            PaymentError::GatewayTimeout => "GatewayTimeout",
            PaymentError::Database(_) => "PersistenceError",
            PaymentError::TransactionNotFound(_) => "TransactionNotFound",
            PaymentError::OrderNotFound(_) => "OrderNotFound",
            PaymentError::OrderAlreadyPaid(_) => "OrderAlreadyPaid",
            PaymentError::InvalidStateTransition { .. } => "InvalidStateTransition",
            PaymentError::InvalidEvent { .. } => "InvalidEvent",
            PaymentError::InsufficientStock { .. } => "InsufficientStock",
            PaymentError::UnsupportedPaymentMethod(_) => "UnsupportedPaymentMethod",
            PaymentError::UnsupportedOperation(_) => "UnsupportedOperation",
            PaymentError::RateLimited => "RateLimited",
            PaymentError::Internal(_) => "InternalError",
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut error = json!({ "type": self.error_type() });
        if let PaymentError::ProviderRejection { code, .. } = &self {
            error["code"] = json!(code);
        }

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
            "error": error
        }));

        (status, body).into_response()
    }
}
