use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ticket_bridge::config::BridgeConfig;
use ticket_bridge::handler::RequestHandler;
use ticket_bridge::router::EventRouter;
use ticket_bridge::server::{AppState, build_router};
use ticket_bridge::store::SqliteStore;
use ticket_bridge::tickets::RtConnector;

#[tokio::main]
async fn main() -> Result<()> {
    let config = BridgeConfig::from_env().context("loading configuration from environment")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(?config, "Starting ticket bridge");

    let store = SqliteStore::open(&config.correlation_db, &config.correlation_table)
        .with_context(|| format!("opening correlation store {}", config.correlation_db))?;
    let connector = RtConnector::new(config.rt_config()).context("configuring RT client")?;

    let router = EventRouter::new(store, connector, config.router_settings());
    let handler = RequestHandler::new(config.gh_secret.as_bytes(), router, config.verbose());
    let app = build_router(AppState::new(handler));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
