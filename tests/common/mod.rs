//! Shared test doubles for the gateway

#![allow(dead_code)]

use async_trait::async_trait;
use payconfirm::error::GatewayError;
use payconfirm::payments::{
    InitiatePaymentRequest, PaymentGateway, PaymentParameters, SettlementStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted gateway that counts every call it receives
#[derive(Debug, Default)]
pub struct MockGateway {
    polls: AtomicUsize,
    expiries: AtomicUsize,
    initiations: AtomicUsize,
    /// 1-based poll on which the payment reports settled
    paid_on: Option<usize>,
    /// Polls up to and including this one fail with a 503
    failing_until: usize,
    fail_mark_expired: bool,
}

impl MockGateway {
    pub fn never_paid() -> Self {
        Self::default()
    }

    pub fn paid_on(poll: usize) -> Self {
        Self {
            paid_on: Some(poll),
            ..Self::default()
        }
    }

    pub fn failing_until(mut self, poll: usize) -> Self {
        self.failing_until = poll;
        self
    }

    pub fn with_failing_expiry(mut self) -> Self {
        self.fail_mark_expired = true;
        self
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn expiries(&self) -> usize {
        self.expiries.load(Ordering::SeqCst)
    }

    pub fn initiations(&self) -> usize {
        self.initiations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn check_settlement(
        &self,
        _transaction_code: &str,
    ) -> Result<SettlementStatus, GatewayError> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if poll <= self.failing_until {
            return Err(GatewayError::Status {
                status: 503,
                body: "upstream unavailable".to_string(),
            });
        }
        Ok(SettlementStatus {
            is_paid: self.paid_on.is_some_and(|n| poll >= n),
        })
    }

    async fn mark_expired(&self, _transaction_code: &str) -> Result<(), GatewayError> {
        self.expiries.fetch_add(1, Ordering::SeqCst);
        if self.fail_mark_expired {
            return Err(GatewayError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(())
    }

    async fn initiate(
        &self,
        request: &InitiatePaymentRequest,
    ) -> Result<PaymentParameters, GatewayError> {
        let n = self.initiations.fetch_add(1, Ordering::SeqCst) + 1;
        PaymentParameters::new(
            format!("TX-{:03}", n),
            "0123456789",
            "TPB",
            "NGUYEN VAN A",
            request.amount,
        )
        .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

pub fn tx001() -> PaymentParameters {
    PaymentParameters::new("TX-001", "0123456789", "TPB", "NGUYEN VAN A", 150000.0)
        .expect("valid parameters")
}
