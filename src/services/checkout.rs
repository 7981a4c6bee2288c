//! Checkout hand-off
//!
//! The step before the confirmation screen: create the payment at the
//! gateway and stash its parameters where the screen expects to find them.

use tracing::{info, instrument, warn};

use crate::error::ConfirmationError;
use crate::logging::mask_account_number;
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{InitiatePaymentRequest, PaymentParameters};
use crate::store::ParameterStash;

/// Initiate a payment and stash the issued parameters
#[instrument(skip(gateway, stash, request), fields(course_id = %request.course_id))]
pub async fn begin_checkout(
    gateway: &dyn PaymentGateway,
    stash: &dyn ParameterStash,
    request: &InitiatePaymentRequest,
) -> Result<PaymentParameters, ConfirmationError> {
    if request.course_id.trim().is_empty() {
        return Err(ConfirmationError::InvalidParameters(
            "courseId is required".to_string(),
        ));
    }
    if !request.amount.is_finite() || request.amount < 0.0 {
        return Err(ConfirmationError::InvalidParameters(
            "amount must be a non-negative number".to_string(),
        ));
    }

    let params = gateway.initiate(request).await?;
    stash.stash_parameters(&params).await?;

    info!(
        transaction_code = %params.transaction_code,
        account = %mask_account_number(&params.bank_account_number),
        amount = params.amount,
        "Payment initiated, awaiting bank transfer"
    );
    Ok(params)
}

/// Read the stashed parameters for the confirmation screen.
///
/// Missing or undecodable data is fatal for the session; there is nothing
/// to retry without going back through checkout.
pub async fn load_stashed_parameters(
    stash: &dyn ParameterStash,
    transaction_code: &str,
) -> Result<PaymentParameters, ConfirmationError> {
    if transaction_code.trim().is_empty() {
        return Err(ConfirmationError::MissingParameters);
    }

    let raw = stash
        .stashed_parameters(transaction_code)
        .await?
        .ok_or(ConfirmationError::MissingParameters)?;

    let params: PaymentParameters = serde_json::from_str(&raw).map_err(|e| {
        warn!(transaction_code = %transaction_code, error = %e, "Stashed payment parameters are unreadable");
        ConfirmationError::InvalidParameters(e.to_string())
    })?;
    params.validate()?;
    if params.transaction_code != transaction_code {
        return Err(ConfirmationError::InvalidParameters(format!(
            "stash for {} holds {}",
            transaction_code, params.transaction_code
        )));
    }
    Ok(params)
}
