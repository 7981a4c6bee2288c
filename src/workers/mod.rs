//! Background workers

pub mod confirmation;
pub mod view;

pub use confirmation::{ConfirmationSession, PaymentConfirmation};
pub use view::{ConfirmationView, SessionState, TransferDetails};
