//! Services around the confirmation worker

pub mod checkout;
pub mod display;

pub use checkout::{begin_checkout, load_stashed_parameters};
