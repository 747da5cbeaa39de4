#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Mentora API Server
//!
//! Webhook ingress for the payment/booking reconciliation pipeline, plus the
//! internal compensation and invariant-check endpoints.

mod config;
mod error;
mod routes;
mod state;

use std::net::SocketAddr;

use mentora_shared::{create_migration_pool, create_pool, run_migrations};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::Config, routes::create_router, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mentora_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mentora API Server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection established");

    // Migrations run through a direct single-connection pool; the regular
    // pool may sit behind a pooler that breaks prepared statements.
    tracing::info!("Running database migrations...");
    let migration_pool = create_migration_pool(&config.database_url).await?;
    run_migrations(&migration_pool).await?;
    migration_pool.close().await;

    let state = AppState::new(pool, config.clone())?;

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
