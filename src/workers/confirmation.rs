//! Bank-Transfer Payment Confirmation Worker
//!
//! Drives one payment from "QR code shown" to exactly one terminal state:
//! - Short-circuits when the status store already holds an outcome
//! - Polls the gateway for settlement on a fixed interval
//! - Races the poll loop against a hard deadline
//! - Persists the winning outcome, append-once, to the status store
//!
//! Every terminal transition goes through `claim`, which is serialized with
//! teardown by the watch channel's lock. Whoever claims first owns the
//! outcome; everyone else backs off.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use super::view::{ConfirmationView, SessionState, TransferDetails};
use crate::config::{ConfirmationConfig, MAX_PAYMENT_TIMEOUT};
use crate::error::ConfirmationError;
use crate::log_payment;
use crate::logging::mask_account_number;
use crate::payments::gateway::PaymentGateway;
use crate::payments::qr::qr_url_for;
use crate::payments::types::{PaymentParameters, TerminalStatus};
use crate::services::display::{format_currency, format_remaining};
use crate::store::{StatusStore, WriteOutcome};

// ============================================================================
// Orchestrator
// ============================================================================

/// Starts confirmation sessions against a gateway and a status store
#[derive(Clone)]
pub struct PaymentConfirmation {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn StatusStore>,
    config: ConfirmationConfig,
    shutdown_rx: Option<watch::Receiver<bool>>,
}

impl PaymentConfirmation {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn StatusStore>,
        config: ConfirmationConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            config,
            shutdown_rx: None,
        }
    }

    /// Stop every running session's worker when the process shuts down.
    /// Sessions stopped this way are left pending; nothing is written.
    pub fn with_shutdown(mut self, shutdown_rx: watch::Receiver<bool>) -> Self {
        self.shutdown_rx = Some(shutdown_rx);
        self
    }

    pub fn config(&self) -> &ConfirmationConfig {
        &self.config
    }

    /// Mount a confirmation session for an already-initiated payment
    #[instrument(skip(self, params), fields(transaction_code = %params.transaction_code))]
    pub async fn start(
        &self,
        params: PaymentParameters,
    ) -> Result<ConfirmationSession, ConfirmationError> {
        params.validate()?;
        let code = params.transaction_code.clone();

        let recorded = match self.store.get(&code).await {
            Ok(status) => status.and_then(|s| s.terminal()),
            Err(e) => {
                warn!(error = %e, "Status store unreadable, treating payment as pending");
                None
            }
        };

        let timeout = self.config.payment_timeout.min(MAX_PAYMENT_TIMEOUT);
        let started_at = Instant::now();
        let deadline = started_at
            .checked_add(timeout)
            .ok_or_else(|| ConfirmationError::InvalidParameters("payment window too long".to_string()))?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::zero());

        let initial = match recorded {
            Some(outcome) => SessionState::AlreadyResolved(outcome),
            None => SessionState::Pending,
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let state_tx = Arc::new(state_tx);
        let current = Arc::new(AtomicBool::new(true));

        let task = if let Some(outcome) = recorded {
            info!(status = %outcome, "Payment already resolved, skipping confirmation");
            None
        } else {
            info!(
                account = %mask_account_number(&params.bank_account_number),
                amount = params.amount,
                timeout_secs = timeout.as_secs(),
                poll_interval_secs = self.config.poll_interval.as_secs(),
                "Awaiting bank transfer settlement"
            );

            let worker = ConfirmationWorker {
                gateway: Arc::clone(&self.gateway),
                store: Arc::clone(&self.store),
                transaction_code: code.clone(),
                poll_interval: self.config.poll_interval,
                started_at,
                deadline,
                state_tx: Arc::clone(&state_tx),
                current: Arc::clone(&current),
            };
            let shutdown_rx = self.shutdown_rx.clone();
            Some(tokio::spawn(
                worker
                    .run(shutdown_rx)
                    .instrument(info_span!("payment_confirmation", transaction_code = %code)),
            ))
        };

        Ok(ConfirmationSession {
            qr_url: qr_url_for(&self.config.qr_provider_host, &params),
            params,
            success_route: self.config.success_route.clone(),
            restart_route: self.config.restart_route.clone(),
            deadline,
            expires_at,
            state_tx,
            state_rx,
            current,
            task,
            gateway: Arc::clone(&self.gateway),
            store: Arc::clone(&self.store),
            runtime: Handle::current(),
            closed: false,
        })
    }
}

// ============================================================================
// Worker
// ============================================================================

struct ConfirmationWorker {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn StatusStore>,
    transaction_code: String,
    poll_interval: Duration,
    started_at: Instant,
    deadline: Instant,
    state_tx: Arc<watch::Sender<SessionState>>,
    current: Arc<AtomicBool>,
}

impl ConfirmationWorker {
    async fn run(self, shutdown_rx: Option<watch::Receiver<bool>>) {
        // The losing branch is dropped, which cancels its timer or in-flight poll
        let outcome = tokio::select! {
            biased;
            _ = wait_for_shutdown(shutdown_rx) => {
                info!("Shutdown signal received, stopping confirmation");
                return;
            }
            _ = self.poll_until_settled() => TerminalStatus::Success,
            _ = sleep_until(self.deadline) => TerminalStatus::Expired,
        };

        self.resolve(outcome).await;
    }

    async fn poll_until_settled(&self) {
        let mut attempt: u32 = 0;

        loop {
            if Instant::now() >= self.deadline || !self.current.load(Ordering::Acquire) {
                // Past the deadline the watcher owns the outcome
                return std::future::pending().await;
            }

            attempt += 1;
            match self.gateway.check_settlement(&self.transaction_code).await {
                Ok(status) if status.is_paid => {
                    info!(poll = attempt, "Settlement confirmed by gateway");
                    return;
                }
                Ok(_) => {
                    debug!(poll = attempt, "Payment not settled yet");
                }
                Err(e) => {
                    warn!(
                        poll = attempt,
                        error = %e,
                        transient = e.is_transient(),
                        "Settlement check failed, retrying on next tick"
                    );
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Atomically move Pending → outcome if this session is still current
    fn claim(&self, outcome: TerminalStatus) -> bool {
        let current = &self.current;
        self.state_tx.send_if_modified(|state| {
            if !current.load(Ordering::Acquire) || !state.is_pending() {
                return false;
            }
            *state = SessionState::from(outcome);
            true
        })
    }

    async fn resolve(&self, outcome: TerminalStatus) {
        let code = self.transaction_code.as_str();
        let elapsed_secs = self.started_at.elapsed().as_secs();

        // Another session may have recorded an outcome for this code meanwhile
        let recorded = match self.store.get(code).await {
            Ok(status) => status.and_then(|s| s.terminal()),
            Err(e) => {
                warn!(error = %e, "Status store unreadable before terminal write");
                None
            }
        };

        if let Some(existing) = recorded {
            if self.claim(existing) {
                if existing != outcome {
                    warn!(
                        existing = %existing,
                        observed = %outcome,
                        "Adopting outcome recorded by another session"
                    );
                }
                log_payment!(
                    event = "payment_resolved",
                    transaction_code = code,
                    status = existing.as_str(),
                    elapsed_secs = elapsed_secs,
                    source = "store",
                );
            }
            return;
        }

        if !self.claim(outcome) {
            debug!(status = %outcome, "Session already resolved or torn down, dropping outcome");
            return;
        }

        if outcome == TerminalStatus::Expired {
            if let Err(e) = self.gateway.mark_expired(code).await {
                warn!(error = %e, "Failed to mark payment expired at gateway");
            }
        }

        match self.store.set(code, outcome).await {
            Ok(WriteOutcome::Conflict { existing }) => {
                warn!(
                    existing = %existing,
                    attempted = %outcome,
                    "Store kept an earlier outcome for this payment"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, status = %outcome, "Failed to persist payment outcome");
            }
        }

        log_payment!(
            event = "payment_resolved",
            transaction_code = code,
            status = outcome.as_str(),
            elapsed_secs = elapsed_secs,
            source = "worker",
        );
    }
}

async fn wait_for_shutdown(shutdown_rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = shutdown_rx else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without signalling; keep running
            return std::future::pending().await;
        }
    }
}

// ============================================================================
// Session handle
// ============================================================================

/// A mounted confirmation screen.
///
/// Dropping the session cancels its worker like `teardown(false)`.
pub struct ConfirmationSession {
    params: PaymentParameters,
    qr_url: String,
    success_route: String,
    restart_route: String,
    deadline: Instant,
    expires_at: DateTime<Utc>,
    state_tx: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
    current: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn StatusStore>,
    runtime: Handle,
    closed: bool,
}

impl ConfirmationSession {
    pub fn transaction_code(&self) -> &str {
        &self.params.transaction_code
    }

    pub fn params(&self) -> &PaymentParameters {
        &self.params
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Wait until the session reaches a terminal state
    #[allow(clippy::let_and_return)]
    pub async fn resolved(&self) -> SessionState {
        let mut rx = self.state_rx.clone();
        // The watch guard borrows `rx`; release it before `rx` goes out of scope
        let state = match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }

    pub fn view(&self) -> ConfirmationView {
        let state = self.state();
        let already_resolved = matches!(state, SessionState::AlreadyResolved(_));
        let transaction_code = self.params.transaction_code.clone();

        match state.outcome() {
            None => {
                let remaining = self.remaining();
                ConfirmationView::AwaitingTransfer(TransferDetails {
                    transaction_code,
                    qr_url: self.qr_url.clone(),
                    bank_account_number: self.params.bank_account_number.clone(),
                    bank_code: self.params.bank_code.clone(),
                    account_holder: self.params.account_holder.clone(),
                    amount: self.params.amount,
                    amount_display: format_currency(self.params.amount),
                    remaining_secs: remaining.as_secs(),
                    remaining_display: format_remaining(remaining),
                    expires_at: self.expires_at,
                })
            }
            Some(TerminalStatus::Success) => ConfirmationView::Confirmed {
                transaction_code,
                message: "Payment received. Your enrollment is confirmed.".to_string(),
                redirect_to: self.success_route.clone(),
                already_resolved,
            },
            Some(TerminalStatus::Expired) => ConfirmationView::Expired {
                transaction_code,
                message: "The payment window has closed without a confirmed transfer."
                    .to_string(),
                restart_route: self.restart_route.clone(),
                already_resolved,
            },
        }
    }

    /// Unmount the session.
    ///
    /// Cancels the worker before returning. When the payment is still pending
    /// and `abandon` is set, the session resolves as expired and a detached,
    /// best-effort task notifies the gateway and records the outcome.
    pub fn teardown(mut self, abandon: bool) {
        self.close(abandon);
    }

    fn close(&mut self, abandon: bool) {
        if self.closed {
            return;
        }
        self.closed = true;

        let current = &self.current;
        let mut was_pending = false;
        self.state_tx.send_if_modified(|state| {
            current.store(false, Ordering::Release);
            was_pending = state.is_pending();
            if was_pending && abandon {
                *state = SessionState::Expired;
                true
            } else {
                false
            }
        });

        if !was_pending {
            // Resolved sessions finish persisting on their own
            debug!(transaction_code = %self.params.transaction_code, "Session closed after resolution");
            return;
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }

        if !abandon {
            debug!(transaction_code = %self.params.transaction_code, "Pending session closed without abandonment");
            return;
        }

        info!(
            transaction_code = %self.params.transaction_code,
            "Payment abandoned while pending, expiring in background"
        );
        let gateway = Arc::clone(&self.gateway);
        let store = Arc::clone(&self.store);
        let code = self.params.transaction_code.clone();
        self.runtime.spawn(
            async move {
                if let Err(e) = gateway.mark_expired(&code).await {
                    warn!(error = %e, "Best-effort expiry on abandonment failed");
                }
                if let Err(e) = store.set(&code, TerminalStatus::Expired).await {
                    warn!(error = %e, "Failed to record abandoned payment as expired");
                }
            }
            .instrument(info_span!("payment_abandonment", transaction_code = %self.params.transaction_code)),
        );
    }
}

impl Drop for ConfirmationSession {
    fn drop(&mut self) {
        self.close(false);
    }
}

impl std::fmt::Debug for ConfirmationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationSession")
            .field("transaction_code", &self.params.transaction_code)
            .field("state", &self.state())
            .field("closed", &self.closed)
            .finish()
    }
}
