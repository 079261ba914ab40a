use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use groundwatch_insar::InsarApi;
use groundwatch_worker::config::WorkerConfig;
use groundwatch_worker::pool::WorkerPool;
use groundwatch_worker::scheduler;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "groundwatch_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env().expect("Invalid worker configuration");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = groundwatch_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    groundwatch_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    let base_url = std::env::var("INSAR_API_URL").expect("INSAR_API_URL must be set");
    let api_key = std::env::var("INSAR_API_KEY").ok();
    let service = Arc::new(InsarApi::new(base_url, api_key));

    let cancel = CancellationToken::new();

    let worker_pool = WorkerPool::new(pool.clone(), service, config.clone());
    let pool_cancel = cancel.clone();
    let pool_handle = tokio::spawn(async move {
        worker_pool.run(pool_cancel).await;
    });

    let scheduler_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(scheduler::run(pool.clone(), config, scheduler_cancel));

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");
    cancel.cancel();

    let _ = pool_handle.await;
    let _ = scheduler_handle.await;
    tracing::info!("Worker stopped");
}
