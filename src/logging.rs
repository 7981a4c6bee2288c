//! Logging and tracing configuration
//!
//! Provides structured logging with JSON formatting in production and
//! human-readable output in development, plus redaction helpers for the
//! bank details and gateway payloads that end up in log lines.

use std::env;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Environment types for logging configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Detect environment from ENV variable
    pub fn from_env() -> Self {
        match env::var("ENVIRONMENT")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "prod" | "production" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        }
    }

    /// Get default log level for environment
    pub fn default_log_level(&self) -> Level {
        match self {
            Self::Development => Level::DEBUG,
            Self::Staging => Level::INFO,
            Self::Production => Level::INFO,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Initialize the tracing subscriber with appropriate formatting
///
/// # Environment Variables
/// - `ENVIRONMENT` or `ENV`: Set to "production", "staging", or "development"
/// - `RUST_LOG`: Override log level (e.g., "info", "debug", "warn")
/// - `LOG_FORMAT`: Force format to "json" or "pretty"
pub fn init_tracing() {
    let environment = Environment::from_env();

    let use_json = env::var("LOG_FORMAT")
        .map(|f| f.to_lowercase() == "json")
        .unwrap_or_else(|_| environment.is_production());

    // Our crate at the environment level, chatty dependencies at warn
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(format!(
                "{}={},tower_http=debug,axum=debug,hyper=warn,reqwest=warn,redis=warn",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                environment.default_log_level()
            ))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        let json_layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_target(true)
            .with_level(true)
            .with_file(false)
            .with_line_number(false)
            .with_filter(env_filter);

        tracing_subscriber::registry().with(json_layer).init();
    } else {
        let pretty_layer = fmt::layer()
            .pretty()
            .with_target(true)
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter);

        tracing_subscriber::registry().with(pretty_layer).init();
    }

    tracing::info!(
        environment = ?environment,
        format = if use_json { "json" } else { "pretty" },
        "Tracing initialized"
    );
}

/// Mask a bank account number for logging
///
/// Keeps the last 4 digits, masks the rest
///
/// # Examples
/// ```
/// # use payconfirm::logging::mask_account_number;
/// assert_eq!(mask_account_number("0123456789"), "******6789");
/// assert_eq!(mask_account_number("123"), "****");
/// ```
pub fn mask_account_number(account: &str) -> String {
    let chars: Vec<char> = account.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

/// Redact sensitive fields from JSON-like structures
///
/// Replaces values for keys like "token", "password", "accountNumber"
pub fn redact_sensitive_data(text: &str) -> String {
    let sensitive_keys = [
        "secret",
        "password",
        "token",
        "accessToken",
        "access_token",
        "api_key",
        "apiKey",
        "authorization",
        "bankAccountNumber",
        "bank_account_number",
        "accountNumber",
    ];

    let mut result = text.to_string();
    for key in &sensitive_keys {
        let patterns = [
            format!(r#""{}":\s*"[^"]*""#, key),
            format!(r#"'{}': '[^']*'"#, key),
        ];

        for pattern in &patterns {
            if let Ok(re) = regex::Regex::new(pattern) {
                result = re
                    .replace_all(&result, format!(r#""{}": "[REDACTED]""#, key))
                    .to_string();
            }
        }
    }
    result
}

/// Log a payment lifecycle event with consistent structure
///
/// # Examples
/// ```no_run
/// # use payconfirm::log_payment;
/// log_payment!(
///     event = "payment_settled",
///     transaction_code = "TX-001",
///     amount = 150000,
/// );
/// ```
#[macro_export]
macro_rules! log_payment {
    ($($key:tt = $value:expr),* $(,)?) => {
        tracing::info!(
            event_type = "payment",
            $($key = tracing::field::debug(&$value)),*
        );
    };
}
