//! Mentora Background Worker
//!
//! Handles scheduled jobs:
//! - Ranking reducer: fold unprocessed analytics events into mentor scores
//!   (every 15 minutes)
//! - Ranking decay: 5% multiplicative decay of all scores (weekly)
//! - Heartbeat (every 5 minutes)
//!
//! Both ranking jobs are idempotent under overlapping triggers: a reducer
//! run that finds no unprocessed events does nothing, and an extra decay is
//! just a slightly larger decay.

use std::time::Duration;

use anyhow::Context;
use mentora_pipeline::RankingReducer;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting Mentora Worker");

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = mentora_shared::create_pool(&database_url).await?;
    info!("Database pool created");
    let reducer = RankingReducer::new(pool.clone());

    let scheduler = JobScheduler::new().await?;

    // Job 1: Ranking reducer (every 15 minutes)
    // Cron: at minute 0, 15, 30, 45 of every hour
    let reducer_job = reducer.clone();
    scheduler
        .add(Job::new_async("0 */15 * * * *", move |_uuid, _l| {
            let reducer = reducer_job.clone();
            Box::pin(async move {
                info!("Running ranking reducer");
                match reducer.run().await {
                    Ok(summary) => info!(
                        events_consumed = summary.events_consumed,
                        mentors_updated = summary.mentors_updated,
                        "Ranking reducer run complete"
                    ),
                    Err(e) => error!(error = %e, "Ranking reducer run failed"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Ranking reducer (every 15 minutes)");

    // Job 2: Weekly score decay (Sundays at 03:00 UTC)
    let decay_reducer = reducer.clone();
    scheduler
        .add(Job::new_async("0 0 3 * * Sun", move |_uuid, _l| {
            let reducer = decay_reducer.clone();
            Box::pin(async move {
                info!("Running weekly ranking decay");
                match reducer.decay().await {
                    Ok(mentors) => info!(mentors = mentors, "Ranking decay complete"),
                    Err(e) => error!(error = %e, "Ranking decay failed"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Ranking decay (weekly, Sunday 03:00 UTC)");

    // Job 3: Health check heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Health check heartbeat (every 5 minutes)");

    info!("Starting job scheduler");
    scheduler.start().await?;

    info!("Mentora Worker started successfully with 3 scheduled jobs");

    // Keep the main task running; the scheduler runs jobs in background tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
