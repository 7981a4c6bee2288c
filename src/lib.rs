//! Bank-transfer payment confirmation engine
//!
//! Drives a QR-code bank payment to exactly one terminal state (settled or
//! expired) by polling a payment gateway against a hard deadline, and keeps
//! the outcome in a durable status store so a remounted screen resolves
//! without polling again.

pub mod config;
pub mod error;
pub mod logging;
pub mod payments;
pub mod services;
pub mod store;
pub mod workers;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod middleware;

pub use config::{AppConfig, ConfirmationConfig};
pub use error::{ConfirmationError, GatewayError, StoreError};
pub use payments::{PaymentGateway, PaymentParameters, PaymentStatus, TerminalStatus};
pub use store::{StatusStore, WriteOutcome};
pub use workers::{ConfirmationSession, ConfirmationView, PaymentConfirmation, SessionState};
