//! # Teamboard API Server
//!
//! Team task board backend: teams with managers and members, tasks with a
//! comment-gated `blocked` status, per-task comments, and a WebSocket channel
//! that pushes every change to the members of the affected team.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://... JWT_SECRET=... cargo run -p teamboard-api
//!
//! # No database, state lost on exit
//! STORE_BACKEND=memory JWT_SECRET=... cargo run -p teamboard-api
//! ```

use std::sync::Arc;

use anyhow::Context as _;
use teamboard_api::app::{build_router, AppState};
use teamboard_api::config::{Config, StoreBackend};
use teamboard_shared::db::migrations::{ensure_database_exists, run_migrations};
use teamboard_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use teamboard_shared::store::{DynStore, MemoryStore, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "teamboard_api=debug,teamboard_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "Teamboard API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let (store, pool) = match config.database.backend {
        StoreBackend::Postgres => {
            ensure_database_exists(&config.database.url)
                .await
                .context("Failed to ensure database exists")?;

            let pool = create_pool(DatabaseConfig {
                max_connections: config.database.max_connections,
                ..DatabaseConfig::new(config.database.url.clone())
            })
            .await
            .context("Failed to create database pool")?;

            if config.database.run_migrations {
                run_migrations(&pool)
                    .await
                    .context("Failed to run migrations")?;
            }

            let store: DynStore = Arc::new(PgStore::new(pool.clone()));
            (store, Some(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; all data is lost on exit");
            let store: DynStore = Arc::new(MemoryStore::new());
            (store, None)
        }
    };

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pool) = pool {
        close_pool(pool).await;
    }
    tracing::info!("Server stopped");

    Ok(())
}
