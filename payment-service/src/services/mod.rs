pub mod notification;
pub mod payment_service;
