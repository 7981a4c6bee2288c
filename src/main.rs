use std::sync::Arc;

use anyhow::Context;
use payconfirm::api::{self, payments::PaymentApiState};
use payconfirm::config::{AppConfig, ConfirmationConfig};
use payconfirm::logging::init_tracing;
use payconfirm::payments::{HttpPaymentGateway, PaymentGateway};
use payconfirm::store::{InMemoryStatusStore, ParameterStash, StatusStore};
use payconfirm::workers::PaymentConfirmation;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::load().context("failed to load configuration")?;
    init_tracing();

    info!(
        bind_addr = %app_config.bind_addr,
        gateway = %app_config.gateway_base_url,
        "Starting payment confirmation service"
    );

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        HttpPaymentGateway::new(
            app_config.gateway_base_url.clone(),
            app_config.gateway_token.clone(),
            app_config.gateway_timeout(),
        )
        .context("failed to build gateway client")?,
    );

    let (store, stash) = build_store(&app_config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let confirmation =
        PaymentConfirmation::new(Arc::clone(&gateway), store, ConfirmationConfig::from_env())
            .with_shutdown(shutdown_rx);

    let state = PaymentApiState::new(confirmation, gateway, stash);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&app_config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", app_config.bind_addr))?;
    info!(addr = %app_config.bind_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("server error")?;

    info!("Payment confirmation service stopped");
    Ok(())
}

#[cfg(feature = "cache")]
async fn build_store(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn StatusStore>, Arc<dyn ParameterStash>)> {
    if let Some(url) = &config.redis_url {
        let store = Arc::new(
            payconfirm::store::RedisStatusStore::connect(url)
                .await
                .context("failed to connect to Redis")?,
        );
        let status_store: Arc<dyn StatusStore> = store.clone();
        let stash: Arc<dyn ParameterStash> = store;
        return Ok((status_store, stash));
    }
    Ok(in_memory_store())
}

#[cfg(not(feature = "cache"))]
async fn build_store(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn StatusStore>, Arc<dyn ParameterStash>)> {
    if config.redis_url.is_some() {
        warn!("redis_url is set but the cache feature is disabled, using in-memory store");
    }
    Ok(in_memory_store())
}

fn in_memory_store() -> (Arc<dyn StatusStore>, Arc<dyn ParameterStash>) {
    warn!("Using in-memory status store, outcomes will not survive a restart");
    let store = Arc::new(InMemoryStatusStore::new());
    let status_store: Arc<dyn StatusStore> = store.clone();
    let stash: Arc<dyn ParameterStash> = store;
    (status_store, stash)
}
