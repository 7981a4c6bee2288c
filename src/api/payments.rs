//! Payment confirmation API endpoints
//!
//! Hosts the confirmation screen: each mounted session lives in a registry
//! keyed by transaction code until the client tears it down, or until a
//! retention period after it resolves.

pub mod models;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, info_span, warn, Instrument};

use self::models::{ApiError, MountRequest, TeardownQuery, TeardownResponse};
use crate::middleware::logging::log_external_call;
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{InitiatePaymentRequest, PaymentParameters};
use crate::services::checkout::{begin_checkout, load_stashed_parameters};
use crate::store::ParameterStash;
use crate::workers::{ConfirmationSession, ConfirmationView, PaymentConfirmation, SessionState};

/// How long a resolved session stays viewable before it is evicted
pub const SESSION_RETENTION: Duration = Duration::from_secs(5 * 60);

type SessionRegistry = Arc<RwLock<HashMap<String, ConfirmationSession>>>;

/// Service dependencies for the payment endpoints
#[derive(Clone)]
pub struct PaymentApiState {
    pub confirmation: PaymentConfirmation,
    pub gateway: Arc<dyn PaymentGateway>,
    pub stash: Arc<dyn ParameterStash>,
    pub sessions: SessionRegistry,
    session_retention: Duration,
}

impl PaymentApiState {
    pub fn new(
        confirmation: PaymentConfirmation,
        gateway: Arc<dyn PaymentGateway>,
        stash: Arc<dyn ParameterStash>,
    ) -> Self {
        Self {
            confirmation,
            gateway,
            stash,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            session_retention: SESSION_RETENTION,
        }
    }

    pub fn with_session_retention(mut self, retention: Duration) -> Self {
        self.session_retention = retention;
        self
    }

    fn catalog_route(&self) -> &str {
        &self.confirmation.config().restart_route
    }

    /// Drop the session from the registry once it has been resolved for the
    /// retention period. Clients that never tear down still get cleaned up,
    /// since a pending session always resolves at its deadline.
    fn schedule_eviction(&self, code: String, mut state_rx: watch::Receiver<SessionState>) {
        let sessions = Arc::clone(&self.sessions);
        let stash = Arc::clone(&self.stash);
        let retention = self.session_retention;
        let span = info_span!("session_eviction", transaction_code = %code);

        tokio::spawn(
            async move {
                if state_rx.wait_for(|state| state.is_terminal()).await.is_err() {
                    // Torn down and dropped before resolving
                    return;
                }
                tokio::time::sleep(retention).await;

                let evicted = {
                    let mut sessions = sessions.write().await;
                    let same_session = sessions
                        .get(&code)
                        .is_some_and(|session| session.subscribe().same_channel(&state_rx));
                    if same_session {
                        sessions.remove(&code)
                    } else {
                        None
                    }
                };

                if let Some(session) = evicted {
                    drop(session);
                    if let Err(e) = stash.clear_parameters(&code).await {
                        warn!(error = %e, "Failed to clear stashed parameters");
                    }
                    debug!("Evicted resolved confirmation session");
                }
            }
            .instrument(span),
        );
    }
}

/// POST /api/payments/checkout handler
pub async fn checkout(
    State(state): State<PaymentApiState>,
    Json(request): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentParameters>), ApiError> {
    info!(course_id = %request.course_id, "POST /api/payments/checkout");

    let params = log_external_call(
        "payment_gateway",
        "POST /payments/init",
        begin_checkout(state.gateway.as_ref(), state.stash.as_ref(), &request),
    )
    .await
    .map_err(|e| ApiError::with_return(e, state.catalog_route()))?;

    Ok((StatusCode::CREATED, Json(params)))
}

/// POST /api/payments/confirmation handler
///
/// Mounting twice for the same payment re-renders the live session instead
/// of starting a second one.
pub async fn mount_confirmation(
    State(state): State<PaymentApiState>,
    Json(request): Json<MountRequest>,
) -> Result<Json<ConfirmationView>, ApiError> {
    let code = request.transaction_code;

    if let Some(session) = state.sessions.read().await.get(&code) {
        debug!(transaction_code = %code, "Confirmation already mounted");
        return Ok(Json(session.view()));
    }

    let params = load_stashed_parameters(state.stash.as_ref(), &code)
        .await
        .map_err(|e| {
            warn!(transaction_code = %code, error = %e, "Cannot mount confirmation without payment parameters");
            ApiError::with_return(e, state.catalog_route())
        })?;

    let session = state
        .confirmation
        .start(params)
        .await
        .map_err(|e| ApiError::with_return(e, state.catalog_route()))?;

    let (view, state_rx) = {
        let mut sessions = state.sessions.write().await;
        if let Some(existing) = sessions.get(&code) {
            // Lost a race with a concurrent mount; ours is dropped and cancelled
            return Ok(Json(existing.view()));
        }
        let view = session.view();
        let state_rx = session.subscribe();
        sessions.insert(code.clone(), session);
        (view, state_rx)
    };
    state.schedule_eviction(code, state_rx);

    Ok(Json(view))
}

/// GET /api/payments/confirmation/{code} handler
pub async fn get_confirmation(
    State(state): State<PaymentApiState>,
    Path(code): Path<String>,
) -> Result<Json<ConfirmationView>, ApiError> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&code)
        .ok_or_else(|| ApiError::SessionNotFound(code.clone()))?;
    Ok(Json(session.view()))
}

/// DELETE /api/payments/confirmation/{code} handler
pub async fn teardown_confirmation(
    State(state): State<PaymentApiState>,
    Path(code): Path<String>,
    Query(query): Query<TeardownQuery>,
) -> Result<Json<TeardownResponse>, ApiError> {
    let abandon = query.abandon.unwrap_or(true);
    let session = state
        .sessions
        .write()
        .await
        .remove(&code)
        .ok_or_else(|| ApiError::SessionNotFound(code.clone()))?;

    let state_rx = session.subscribe();
    let was_pending = session.state().is_pending();
    session.teardown(abandon);
    let final_state = *state_rx.borrow();

    if final_state.is_terminal() {
        // The stashed parameters belong to a finished payment now
        if let Err(e) = state.stash.clear_parameters(&code).await {
            warn!(transaction_code = %code, error = %e, "Failed to clear stashed parameters");
        }
    }

    info!(
        transaction_code = %code,
        abandon = abandon,
        status = %final_state.status(),
        "Confirmation session torn down"
    );

    Ok(Json(TeardownResponse {
        transaction_code: code,
        status: final_state.status(),
        abandoned: abandon && was_pending,
    }))
}
