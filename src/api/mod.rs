//! HTTP surface of the confirmation screen

pub mod payments;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use payments::PaymentApiState;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the application router
pub fn router(state: PaymentApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/payments/checkout", post(payments::checkout))
        .route(
            "/api/payments/confirmation",
            post(payments::mount_confirmation),
        )
        .route(
            "/api/payments/confirmation/{code}",
            get(payments::get_confirmation).delete(payments::teardown_confirmation),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}
