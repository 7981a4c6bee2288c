//! Redis-backed status store
//!
//! Terminal writes run as a single Lua script so two sessions racing on the
//! same transaction code cannot both win.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::{debug, info, warn};

use super::{
    classify_write, stash_key, status_key, ParameterStash, StatusStore, WriteOutcome,
    STATUS_KEY_PREFIX,
};
use crate::error::StoreError;
use crate::payments::types::{PaymentParameters, PaymentStatus, TerminalStatus};

/// Writes unless a terminal value is already stored; returns the previous value.
/// Unreadable values are replaced, matching how `get` treats them as absent.
const SET_TERMINAL_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current ~= 'success' and current ~= 'expired' then
    redis.call('SET', KEYS[1], ARGV[1])
end
return current
"#;

/// Stashed parameters outlive any payment window, then expire on their own
const STASH_TTL_SECS: u64 = 60 * 60;

/// Keys fetched per `SCAN` round trip
const SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct RedisStatusStore {
    conn: ConnectionManager,
    set_terminal: Script,
}

impl RedisStatusStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis status store");
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            set_terminal: Script::new(SET_TERMINAL_SCRIPT),
        }
    }
}

fn parse_stored(key: &str, raw: Option<String>) -> Option<PaymentStatus> {
    raw.and_then(|value| match value.parse::<PaymentStatus>() {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring unreadable status record");
            None
        }
    })
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn get(&self, transaction_code: &str) -> Result<Option<PaymentStatus>, StoreError> {
        let key = status_key(transaction_code);
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
        Ok(parse_stored(&key, raw))
    }

    async fn set(
        &self,
        transaction_code: &str,
        status: TerminalStatus,
    ) -> Result<WriteOutcome, StoreError> {
        let key = status_key(transaction_code);
        let mut conn = self.conn.clone();
        let previous: Option<String> = self
            .set_terminal
            .key(&key)
            .arg(status.as_str())
            .invoke_async(&mut conn)
            .await?;

        let outcome = classify_write(parse_stored(&key, previous), status);
        match outcome {
            WriteOutcome::Written => {
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
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(status_key(transaction_code))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", STATUS_KEY_PREFIX);
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                removed += keys.len();
                redis::cmd("DEL").arg(&keys).query_async::<()>(&mut conn).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!(removed = removed, "Cleared payment status records");
        Ok(())
    }
}

#[async_trait]
impl ParameterStash for RedisStatusStore {
    async fn stash_parameters(&self, params: &PaymentParameters) -> Result<(), StoreError> {
        let raw = serde_json::to_string(params)?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(stash_key(&params.transaction_code))
            .arg(raw)
            .arg("EX")
            .arg(STASH_TTL_SECS)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn stashed_parameters(
        &self,
        transaction_code: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(stash_key(transaction_code))
            .query_async(&mut conn)
            .await?;
        Ok(raw)
    }

    async fn clear_parameters(&self, transaction_code: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(stash_key(transaction_code))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}
