pub mod momo;
pub mod vietqr;
