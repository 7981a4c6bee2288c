//! What the confirmation screen renders for each session state

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::payments::types::{PaymentStatus, TerminalStatus};

/// Lifecycle of one confirmation session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Success,
    Expired,
    /// A previous session already recorded this outcome; nothing was polled
    AlreadyResolved(TerminalStatus),
}

impl SessionState {
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionState::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    pub fn outcome(&self) -> Option<TerminalStatus> {
        match self {
            SessionState::Pending => None,
            SessionState::Success => Some(TerminalStatus::Success),
            SessionState::Expired => Some(TerminalStatus::Expired),
            SessionState::AlreadyResolved(outcome) => Some(*outcome),
        }
    }

    pub fn status(&self) -> PaymentStatus {
        self.outcome()
            .map(PaymentStatus::from)
            .unwrap_or(PaymentStatus::Pending)
    }
}

impl From<TerminalStatus> for SessionState {
    fn from(outcome: TerminalStatus) -> Self {
        match outcome {
            TerminalStatus::Success => SessionState::Success,
            TerminalStatus::Expired => SessionState::Expired,
        }
    }
}

/// Transfer instructions shown while the payment is pending
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TransferDetails {
    pub transaction_code: String,
    pub qr_url: String,
    pub bank_account_number: String,
    pub bank_code: String,
    pub account_holder: String,
    pub amount: i64,
    pub amount_display: String,
    pub remaining_secs: u64,
    pub remaining_display: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmationView {
    AwaitingTransfer(TransferDetails),
    Confirmed {
        transaction_code: String,
        message: String,
        redirect_to: String,
        already_resolved: bool,
    },
    Expired {
        transaction_code: String,
        message: String,
        restart_route: String,
        already_resolved: bool,
    },
}

impl ConfirmationView {
    pub fn qr_url(&self) -> Option<&str> {
        match self {
            ConfirmationView::AwaitingTransfer(details) => Some(&details.qr_url),
            _ => None,
        }
    }
}
