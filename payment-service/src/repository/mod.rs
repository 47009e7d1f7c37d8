pub mod order_repository;
pub mod transaction_repository;
