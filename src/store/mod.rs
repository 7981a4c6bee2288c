//! Durable transaction-code → payment status store
//!
//! Terminal values are append-once per key: the first writer wins and a later
//! attempt to record the other terminal value is refused and logged. A
//! literal `pending` (or no record at all) means the payment is unresolved.

pub mod memory;
#[cfg(feature = "cache")]
pub mod redis;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::payments::types::{PaymentParameters, PaymentStatus, TerminalStatus};

pub use memory::InMemoryStatusStore;
#[cfg(feature = "cache")]
pub use self::redis::RedisStatusStore;

/// Prefix of every persisted status key
pub const STATUS_KEY_PREFIX: &str = "payment_status_";

/// Prefix of the keys under which the checkout step stashes payment parameters
pub const PENDING_PAYMENT_KEY: &str = "pending_payment";

/// Build the store key for a transaction code
pub fn status_key(transaction_code: &str) -> String {
    format!("{}{}", STATUS_KEY_PREFIX, transaction_code)
}

/// Build the stash key for a transaction code
pub fn stash_key(transaction_code: &str) -> String {
    format!("{}_{}", PENDING_PAYMENT_KEY, transaction_code)
}

/// Result of an attempted terminal write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The same terminal value was already stored
    Unchanged,
    /// A different terminal value was already stored; nothing was written
    Conflict { existing: TerminalStatus },
}

impl WriteOutcome {
    /// The value the store holds once the write attempt is over
    pub fn effective(&self, attempted: TerminalStatus) -> TerminalStatus {
        match self {
            WriteOutcome::Written | WriteOutcome::Unchanged => attempted,
            WriteOutcome::Conflict { existing } => *existing,
        }
    }
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get(&self, transaction_code: &str) -> Result<Option<PaymentStatus>, StoreError>;

    async fn set(
        &self,
        transaction_code: &str,
        status: TerminalStatus,
    ) -> Result<WriteOutcome, StoreError>;

    async fn remove(&self, transaction_code: &str) -> Result<(), StoreError>;

    /// Remove every status record
    async fn clear_all(&self) -> Result<(), StoreError>;
}

/// Hand-off between the checkout step and the confirmation screen.
///
/// One slot per transaction code, so concurrent checkouts never see each
/// other's parameters.
#[async_trait]
pub trait ParameterStash: Send + Sync {
    async fn stash_parameters(&self, params: &PaymentParameters) -> Result<(), StoreError>;

    /// Raw stashed JSON, if any
    async fn stashed_parameters(&self, transaction_code: &str)
        -> Result<Option<String>, StoreError>;

    async fn clear_parameters(&self, transaction_code: &str) -> Result<(), StoreError>;
}

/// Decide what a terminal write does given the current record
pub(crate) fn classify_write(
    current: Option<PaymentStatus>,
    attempted: TerminalStatus,
) -> WriteOutcome {
    match current.and_then(|status| status.terminal()) {
        None => WriteOutcome::Written,
        Some(existing) if existing == attempted => WriteOutcome::Unchanged,
        Some(existing) => WriteOutcome::Conflict { existing },
    }
}
