pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod models;
pub mod payment;
pub mod repository;
pub mod services;

pub use error::PaymentError;
pub use handlers::router;
pub use services::payment_service::PaymentService;
