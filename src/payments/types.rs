use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfirmationError;

/// Persisted status of a bank-transfer payment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Expired => "expired",
        }
    }

    /// `None` while the payment is still pending
    pub fn terminal(&self) -> Option<TerminalStatus> {
        match self {
            PaymentStatus::Pending => None,
            PaymentStatus::Success => Some(TerminalStatus::Success),
            PaymentStatus::Expired => Some(TerminalStatus::Expired),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "success" => Ok(PaymentStatus::Success),
            "expired" => Ok(PaymentStatus::Expired),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two absorbing outcomes a payment can reach
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    Success,
    Expired,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &'static str {
        PaymentStatus::from(*self).as_str()
    }
}

impl From<TerminalStatus> for PaymentStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Success => PaymentStatus::Success,
            TerminalStatus::Expired => PaymentStatus::Expired,
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bank-transfer parameters issued by the gateway when a payment is initiated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentParameters {
    pub transaction_code: String,
    pub bank_account_number: String,
    pub bank_code: String,
    pub account_holder: String,
    #[serde(deserialize_with = "deserialize_floored_amount")]
    pub amount: i64,
}

impl PaymentParameters {
    pub fn new(
        transaction_code: impl Into<String>,
        bank_account_number: impl Into<String>,
        bank_code: impl Into<String>,
        account_holder: impl Into<String>,
        amount: f64,
    ) -> Result<Self, ConfirmationError> {
        let params = Self {
            transaction_code: transaction_code.into(),
            bank_account_number: bank_account_number.into(),
            bank_code: bank_code.into(),
            account_holder: account_holder.into(),
            amount: floor_amount(amount).map_err(ConfirmationError::InvalidParameters)?,
        };
        params.validate()?;
        Ok(params)
    }

    /// Every field is required; amounts are whole currency units
    pub fn validate(&self) -> Result<(), ConfirmationError> {
        let required = [
            ("transactionCode", &self.transaction_code),
            ("bankAccountNumber", &self.bank_account_number),
            ("bankCode", &self.bank_code),
            ("accountHolder", &self.account_holder),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfirmationError::InvalidParameters(format!(
                    "{} is required",
                    field
                )));
            }
        }
        if self.amount < 0 {
            return Err(ConfirmationError::InvalidParameters(
                "amount must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn floor_amount(amount: f64) -> Result<i64, String> {
    if !amount.is_finite() {
        return Err("amount must be a finite number".to_string());
    }
    if amount < 0.0 {
        return Err("amount must not be negative".to_string());
    }
    Ok(amount.floor() as i64)
}

fn deserialize_floored_amount<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    floor_amount(raw).map_err(serde::de::Error::custom)
}

/// Response of `GET /payments/{code}/payment-status`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementStatus {
    pub is_paid: bool,
}

/// Body of `POST /payments/init`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub course_id: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_literals() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Success,
            PaymentStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert!("paid".parse::<PaymentStatus>().is_err());
        assert_eq!(PaymentStatus::Pending.terminal(), None);
        assert_eq!(
            PaymentStatus::Expired.terminal(),
            Some(TerminalStatus::Expired)
        );
    }

    #[test]
    fn test_amount_is_floored() {
        let params = PaymentParameters::new("TX1", "0123", "TPB", "NGUYEN VAN A", 99.9).unwrap();
        assert_eq!(params.amount, 99);

        let json = r#"{
            "transactionCode": "TX2",
            "bankAccountNumber": "0123",
            "bankCode": "TPB",
            "accountHolder": "NGUYEN VAN A",
            "amount": 150000.75
        }"#;
        let decoded: PaymentParameters = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.amount, 150000);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let err = PaymentParameters::new("", "0123", "TPB", "A", 10.0).unwrap_err();
        assert!(matches!(err, ConfirmationError::InvalidParameters(_)));

        let err = PaymentParameters::new("TX1", "0123", "TPB", "A", f64::NAN).unwrap_err();
        assert!(matches!(err, ConfirmationError::InvalidParameters(_)));

        let err = PaymentParameters::new("TX1", "0123", "TPB", "A", -1.0).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_settlement_wire_format() {
        let status: SettlementStatus = serde_json::from_str(r#"{"isPaid":true}"#).unwrap();
        assert!(status.is_paid);

        let body = serde_json::to_value(InitiatePaymentRequest {
            course_id: "course-42".to_string(),
            amount: 150000.0,
            discount_code: None,
        })
        .unwrap();
        assert_eq!(body["courseId"], "course-42");
        assert!(body.get("discountCode").is_none());
    }
}
