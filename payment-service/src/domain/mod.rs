pub mod events;
pub mod money;
pub mod result_code;
pub mod settlement;
pub mod signature;
pub mod transaction;
