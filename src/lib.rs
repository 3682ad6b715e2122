//! Poll backend: polls with ordered proposals, token-based access for admins and
//! voters, and vote recording with a denormalized voter counter.
//!
//! All data lives in an external database reached through [`store::Store`].
//! [`poll::PollService`] holds a store handle and implements the poll operations;
//! the HTTP layer in [`routes`] and [`handlers`] is a thin JSON wrapper around it.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal::{self, ctrl_c};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod poll;
pub mod routes;
pub mod state;
pub mod store;

use config::Config;
use state::AppState;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load().context("Invalid configuration")?;
    let port = config.port;

    info!("Initializing state...");
    let state = AppState::new(config).await.context("Failed to connect to the database")?;

    let app = routes::create_routes(state);

    let address = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server running on {address}");

    let handle = axum_server::Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    axum_server::bind(address)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal(handle: axum_server::Handle) {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
