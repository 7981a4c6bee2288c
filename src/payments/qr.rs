//! QR image URL for out-of-band bank transfers
//!
//! The QR provider parses the query positionally, so field order and the
//! floored integer amount must stay exactly as built here.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::types::PaymentParameters;

/// Everything but RFC 3986 unreserved characters is escaped
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Default QR image provider
pub const DEFAULT_QR_PROVIDER_HOST: &str = "qr.sepay.vn";

/// Build the QR image URL for a transfer.
///
/// The transaction code doubles as the transfer description so the bank
/// statement can be matched back to the payment.
pub fn build_qr_payload(
    provider_host: &str,
    account_number: &str,
    bank_code: &str,
    amount: f64,
    transaction_code: &str,
) -> String {
    let floored = if amount.is_finite() && amount > 0.0 {
        amount.floor() as i64
    } else {
        0
    };
    format_qr_url(provider_host, account_number, bank_code, floored, transaction_code)
}

/// QR URL for parameters whose amount is already floored
pub fn qr_url_for(provider_host: &str, params: &PaymentParameters) -> String {
    format_qr_url(
        provider_host,
        &params.bank_account_number,
        &params.bank_code,
        params.amount,
        &params.transaction_code,
    )
}

fn format_qr_url(
    provider_host: &str,
    account_number: &str,
    bank_code: &str,
    amount: i64,
    transaction_code: &str,
) -> String {
    format!(
        "https://{}/img?acc={}&bank={}&amount={}&des={}",
        provider_host.trim_end_matches('/'),
        encode_component(account_number),
        encode_component(bank_code),
        amount,
        encode_component(transaction_code)
    )
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, QUERY_COMPONENT).to_string()
}
