//! hostrelay
//!
//! Binds the configured HTTP and TLS relay ports plus the control surface and
//! runs until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hostrelay::api::{create_router, ControlState};
use hostrelay::config::Config;
use hostrelay::{AccessList, Listener, ListenerConfig, Protocol, Resolver, SystemResolver};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to HOSTRELAY_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting hostrelay");
    info!(
        http_listeners = config.http_addrs.len(),
        tls_listeners = config.tls_addrs.len(),
        api_addr = %config.api_addr,
        max_connections = config.max_connections,
        "Configuration loaded"
    );
    if config.secret.is_empty() {
        warn!("HOSTRELAY_SECRET is empty; all access list changes will be refused");
    }

    // Create shared state
    let access = Arc::new(AccessList::new());
    let resolver: Arc<dyn Resolver> = Arc::new(SystemResolver::with_timeout(config.connect_timeout));

    let bindings = config
        .http_addrs
        .iter()
        .map(|addr| (*addr, Protocol::Http))
        .chain(config.tls_addrs.iter().map(|addr| (*addr, Protocol::Tls)));

    let mut listeners = JoinSet::new();
    for (bind_addr, protocol) in bindings {
        let mut listener_config = ListenerConfig::new(bind_addr, protocol);
        listener_config.max_connections = config.max_connections;
        listener_config.sniff_timeout = config.sniff_timeout;

        let listener = Listener::bind(listener_config, Arc::clone(&access), Arc::clone(&resolver))
            .await
            .with_context(|| format!("failed to bind {} listener on {}", protocol, bind_addr))?;

        let listener = Arc::new(listener);
        listeners.spawn(async move {
            if let Err(e) = listener.run().await {
                error!(protocol = %protocol, bind_addr = %bind_addr, error = %e, "Listener error");
            }
        });
    }

    let api_listener = tokio::net::TcpListener::bind(config.api_addr)
        .await
        .with_context(|| format!("failed to bind control surface on {}", config.api_addr))?;
    info!(api_addr = %config.api_addr, "Control surface listening");

    let app = create_router(ControlState::new(Arc::clone(&access), config.secret.as_str()));
    let mut api = tokio::spawn(async move {
        axum::serve(
            api_listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
        result = &mut api => {
            match result {
                Ok(Ok(())) => warn!("Control surface stopped"),
                Ok(Err(e)) => error!(error = %e, "Control surface failed"),
                Err(e) => error!(error = %e, "Control surface task panicked"),
            }
        }
        Some(_) = listeners.join_next() => {
            error!("Listener exited");
        }
    }

    listeners.shutdown().await;
    api.abort();
    info!("hostrelay stopped");
    Ok(())
}
