//! Request and response logging middleware
//!
//! Captures HTTP request/response details including method, path, status,
//! duration, and request IDs. Automatically logs slow requests and errors.

use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Requests slower than this are logged at WARN
const SLOW_REQUEST_MS: u128 = 200;

/// Generate unique request IDs using UUIDv4
#[derive(Clone, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// Middleware for logging HTTP requests and responses
///
/// Logs:
/// - Request method, path and client address
/// - Response status code and processing duration
/// - Slow requests (> 200ms) at WARN level
/// - Request ID for correlation
pub async fn request_logging_middleware(
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let client_ip = extract_client_ip(&request).unwrap_or_else(|| "-".to_string());

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            request
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client_ip = %client_ip,
        "Request started"
    );

    let response = {
        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            method = %method,
            path = %path,
        );

        async move { next.run(request).await }.instrument(span).await
    };

    let duration_ms = start.elapsed().as_millis();
    let status = response.status();

    if duration_ms > SLOW_REQUEST_MS {
        warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration_ms,
            "Slow request completed"
        );
    } else if status.is_server_error() {
        tracing::error!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration_ms,
            "Request failed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration_ms,
            "Request completed with client error"
        );
    } else {
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration_ms,
            "Request completed"
        );
    };

    Ok(response)
}

/// Extract client IP address from proxy headers
pub fn extract_client_ip(request: &Request) -> Option<String> {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

/// Wrap a payment gateway call and log its duration and outcome
pub async fn log_external_call<F, T, E>(service: &str, endpoint: &str, operation: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();

    info!(
        event_type = "external_call_start",
        service = %service,
        endpoint = %endpoint,
        "Calling external service"
    );

    let result = operation.await;
    let duration_ms = start.elapsed().as_millis();

    match &result {
        Ok(_) => {
            info!(
                event_type = "external_call_complete",
                service = %service,
                endpoint = %endpoint,
                duration_ms = %duration_ms,
                "External service call completed"
            );
        }
        Err(e) => {
            tracing::error!(
                event_type = "external_call_error",
                service = %service,
                endpoint = %endpoint,
                duration_ms = %duration_ms,
                error = %e,
                "External service call failed"
            );
        }
    }

    result
}
