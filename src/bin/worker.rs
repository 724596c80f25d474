use judge_core::config::AppConfig;
use judge_core::worker::{default_box_root, Worker};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = AppConfig::from_env()?;

  let pool = PgPoolOptions::new()
    .max_connections(5)
    .connect(&config.database_url)
    .await?;

  let identity = std::env::var("WORKER_IDENTITY").unwrap_or_else(|_| "worker-0".to_string());
  let worker = Worker::new(identity, &default_box_root(), config, pool);

  let shutdown_worker = worker.identity.clone();
  tracing::info!(worker = %shutdown_worker, "worker runtime booting");

  tokio::select! {
    result = worker.run_forever() => {
      result?;
    }
    _ = tokio::signal::ctrl_c() => {
      tracing::info!(worker = %shutdown_worker, "shutdown signal received");
      worker.shutdown().await?;
    }
  }

  Ok(())
}
