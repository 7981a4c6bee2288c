use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{
    classify_write, stash_key, status_key, ParameterStash, StatusStore, WriteOutcome,
    STATUS_KEY_PREFIX,
};
use crate::error::StoreError;
use crate::payments::types::{PaymentParameters, PaymentStatus, TerminalStatus};

/// Process-local store holding raw string values, laid out like browser storage.
///
/// Clone the `Arc` it lives in to let several sessions share it; a fresh
/// session reading what a torn-down one wrote is how a reload looks.
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw value, bypassing the terminal-write policy
    pub async fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().await.insert(key.into(), value.into());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn parse_status(key: &str, raw: &str) -> Option<PaymentStatus> {
    match raw.parse::<PaymentStatus>() {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring unreadable status record");
            None
        }
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn get(&self, transaction_code: &str) -> Result<Option<PaymentStatus>, StoreError> {
        let key = status_key(transaction_code);
        let entries = self.entries.read().await;
        Ok(entries.get(&key).and_then(|raw| parse_status(&key, raw)))
    }

    async fn set(
        &self,
        transaction_code: &str,
        status: TerminalStatus,
    ) -> Result<WriteOutcome, StoreError> {
        let key = status_key(transaction_code);
        let mut entries = self.entries.write().await;
        let current = entries.get(&key).and_then(|raw| parse_status(&key, raw));

        let outcome = classify_write(current, status);
        match outcome {
            WriteOutcome::Written => {
                entries.insert(key, status.as_str().to_string());
                debug!(transaction_code = %transaction_code, status = %status, "Status recorded");
            }
            WriteOutcome::Unchanged => {}
            WriteOutcome::Conflict { existing } => {
                warn!(
                    transaction_code = %transaction_code,
                    existing = %existing,
                    attempted = %status,
                    "Refusing to overwrite terminal status"
                );
            }
        }
        Ok(outcome)
    }

    async fn remove(&self, transaction_code: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .remove(&status_key(transaction_code));
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .retain(|key, _| !key.starts_with(STATUS_KEY_PREFIX));
        Ok(())
    }
}

#[async_trait]
impl ParameterStash for InMemoryStatusStore {
    async fn stash_parameters(&self, params: &PaymentParameters) -> Result<(), StoreError> {
        let raw = serde_json::to_string(params)?;
        self.insert_raw(stash_key(&params.transaction_code), raw).await;
        Ok(())
    }

    async fn stashed_parameters(
        &self,
        transaction_code: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .get(&stash_key(transaction_code))
            .cloned())
    }

    async fn clear_parameters(&self, transaction_code: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .remove(&stash_key(transaction_code));
        Ok(())
    }
}
