//! Runtime configuration
//!
//! `ConfirmationConfig` tunes the confirmation worker and reads plain
//! `PAYMENT_*` variables. `AppConfig` describes the host process and is
//! assembled with the `config` crate from `PAYCONFIRM_*` variables.

use serde::Deserialize;
use std::time::Duration;

use crate::payments::qr::DEFAULT_QR_PROVIDER_HOST;

/// Longest payment window a session will honour
pub const MAX_PAYMENT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the payment confirmation worker
#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// Delay between settlement checks
    pub poll_interval: Duration,
    /// Hard window after which an unsettled payment expires
    pub payment_timeout: Duration,
    /// Host of the QR image provider
    pub qr_provider_host: String,
    /// Where the host sends the user after a confirmed payment
    pub success_route: String,
    /// Where the host sends the user to start over after expiry
    pub restart_route: String,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            payment_timeout: Duration::from_secs(60),
            qr_provider_host: DEFAULT_QR_PROVIDER_HOST.to_string(),
            success_route: "/my-courses".to_string(),
            restart_route: "/courses".to_string(),
        }
    }
}

impl ConfirmationConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.poll_interval = Duration::from_secs(
            std::env::var("PAYMENT_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(cfg.poll_interval.as_secs()),
        );
        cfg.payment_timeout = Duration::from_secs(
            std::env::var("PAYMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(cfg.payment_timeout.as_secs())
                .min(MAX_PAYMENT_TIMEOUT.as_secs()),
        );
        if let Ok(host) = std::env::var("PAYMENT_QR_PROVIDER_HOST") {
            cfg.qr_provider_host = host;
        }
        if let Ok(route) = std::env::var("PAYMENT_SUCCESS_ROUTE") {
            cfg.success_route = route;
        }
        if let Ok(route) = std::env::var("PAYMENT_RESTART_ROUTE") {
            cfg.restart_route = route;
        }
        cfg
    }
}

/// Configuration for the HTTP host process
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub gateway_base_url: String,
    #[serde(default)]
    pub gateway_token: Option<String>,
    pub gateway_timeout_secs: u64,
    /// Use Redis for the status store when set, in-memory otherwise
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:8080")?
            .set_default("gateway_base_url", "http://localhost:3000/api")?
            .set_default("gateway_timeout_secs", 10)?
            .add_source(config::Environment::with_prefix("PAYCONFIRM"))
            .build()?
            .try_deserialize()
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}
