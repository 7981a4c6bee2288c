//! Formatting for the confirmation screen

use std::time::Duration;

/// Currency suffix used for transfer amounts
pub const CURRENCY_SYMBOL: &str = "₫";

/// Remaining time as `MM:SS`, rounded up so the countdown never shows
/// `00:00` while time is still left
pub fn format_remaining(remaining: Duration) -> String {
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Whole-unit amount with `.` thousands separators, e.g. `150.000 ₫`
pub fn format_currency(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{} {}", sign, grouped, CURRENCY_SYMBOL)
}
