//! Application state

use std::sync::Arc;

use mentora_pipeline::PipelineService;
use sqlx::PgPool;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub pipeline: Arc<PipelineService>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let pipeline = PipelineService::from_env(pool.clone())
            .map_err(|e| anyhow::anyhow!("failed to initialize pipeline: {}", e))?;
        tracing::info!("Reconciliation pipeline initialized");

        Ok(Self {
            pool,
            config,
            pipeline: Arc::new(pipeline),
        })
    }
}
