//! Payment gateway boundary: wire types, the gateway trait and its HTTP client

pub mod client;
pub mod gateway;
pub mod qr;
pub mod types;

pub use client::HttpPaymentGateway;
pub use gateway::PaymentGateway;
pub use types::{
    InitiatePaymentRequest, PaymentParameters, PaymentStatus, SettlementStatus, TerminalStatus,
};
