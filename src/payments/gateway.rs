use async_trait::async_trait;

use super::types::{InitiatePaymentRequest, PaymentParameters, SettlementStatus};
use crate::error::GatewayError;

/// Remote payment gateway consumed by the confirmation worker.
///
/// Any call may fail with a network error. The worker treats a failed
/// `check_settlement` as "not paid yet" and a failed `mark_expired` as
/// best-effort.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Ask whether the transfer tagged with `transaction_code` has settled
    async fn check_settlement(&self, transaction_code: &str)
        -> Result<SettlementStatus, GatewayError>;

    /// Tell the gateway the payment window closed without settlement
    async fn mark_expired(&self, transaction_code: &str) -> Result<(), GatewayError>;

    /// Create a payment and receive the bank-transfer parameters for it
    async fn initiate(
        &self,
        request: &InitiatePaymentRequest,
    ) -> Result<PaymentParameters, GatewayError>;
}
