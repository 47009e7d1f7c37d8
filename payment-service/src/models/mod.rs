pub mod enums;
pub mod order;
pub mod payment;
