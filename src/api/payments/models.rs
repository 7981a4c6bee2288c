use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ConfirmationError;
use crate::payments::types::PaymentStatus;

/// Body of `POST /api/payments/confirmation`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountRequest {
    /// Code returned by checkout; selects the stashed parameters
    pub transaction_code: String,
}

/// Query of `DELETE /api/payments/confirmation/{code}`
#[derive(Debug, Deserialize)]
pub struct TeardownQuery {
    /// Leaving the payment screen for good; defaults to true
    pub abandon: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TeardownResponse {
    pub transaction_code: String,
    pub status: PaymentStatus,
    pub abandoned: bool,
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{source}")]
    Confirmation {
        source: ConfirmationError,
        return_to: Option<String>,
    },

    #[error("no confirmation session for {0}")]
    SessionNotFound(String),
}

impl ApiError {
    /// Attach a way back to the catalog to fatal session errors
    pub fn with_return(source: ConfirmationError, catalog_route: &str) -> Self {
        let return_to = source.is_fatal().then(|| catalog_route.to_string());
        ApiError::Confirmation { source, return_to }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Confirmation { source, .. } => match source {
                ConfirmationError::MissingParameters => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_PAYMENT_PARAMETERS")
                }
                ConfirmationError::InvalidParameters(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_PAYMENT_PARAMETERS")
                }
                ConfirmationError::Gateway(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
                ConfirmationError::Store(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "STATUS_STORE_UNAVAILABLE")
                }
            },
            ApiError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        }
    }
}

impl From<ConfirmationError> for ApiError {
    fn from(source: ConfirmationError) -> Self {
        ApiError::Confirmation {
            source,
            return_to: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let return_to = match &self {
            ApiError::Confirmation { return_to, .. } => return_to.clone(),
            ApiError::SessionNotFound(_) => None,
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code,
                message: self.to_string(),
                return_to,
            },
        };
        (status, Json(body)).into_response()
    }
}
