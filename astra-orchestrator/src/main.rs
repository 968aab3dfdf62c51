use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod pipeline;
pub mod repository;
pub mod scheduler;
pub mod service;

use crate::repository::postgres::PgStore;
use crate::repository::{ArtifactStore, JobStore};
use crate::scheduler::Scheduler;
use crate::service::backfill::BackfillPlanner;
use crate::service::guidance::GuidanceService;
use crate::service::job::JobService;
use crate::service::runner::PipelineRunner;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astra_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Astra Orchestrator...");

    let config = config::Config::from_env().expect("Invalid configuration");

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let store = Arc::new(PgStore::new(pool));
    let jobs_store: Arc<dyn JobStore> = store.clone();
    let artifacts_store: Arc<dyn ArtifactStore> = store;

    // Wire the execution side: bounded scheduler feeding the pipeline runner
    let scheduler = Arc::new(Scheduler::new(config.max_concurrent_jobs));
    let runner = Arc::new(PipelineRunner::new(
        jobs_store.clone(),
        artifacts_store.clone(),
        pipeline::remote::remote_pipelines(&config.content_service_url),
    ));
    scheduler.start(runner);
    tracing::info!(
        max_concurrent = config.max_concurrent_jobs,
        "Scheduler started"
    );

    // Wire the request side: job service, backfill planner, guidance gateway
    let jobs = Arc::new(JobService::new(jobs_store, scheduler.clone()));
    let backfill = Arc::new(BackfillPlanner::new(
        artifacts_store.clone(),
        jobs.clone(),
        config.backfill_days,
        config.backfill_delay,
    ));
    let guidance = Arc::new(GuidanceService::new(
        artifacts_store,
        jobs.clone(),
        backfill,
        config.guidance_poll_interval,
        config.guidance_wait_budget,
    ));

    // Build router with all API endpoints
    let app = api::create_router(api::AppState { jobs, guidance });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    // Let in-flight generation finish before the process exits.
    tracing::info!("Draining running jobs...");
    scheduler.shutdown(config.shutdown_grace).await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");
}
