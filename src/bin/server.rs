use std::net::SocketAddr;

use judge_core::api;
use judge_core::config::AppConfig;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = AppConfig::from_env()?;

  let pool = PgPoolOptions::new()
    .max_connections(10)
    .connect(&config.database_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  let state = api::build_state(config, pool)?;
  let app = api::build_router(state);

  let addr: SocketAddr = "0.0.0.0:8000".parse()?;
  tracing::info!(%addr, "starting dispatch API");

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await?;

  Ok(())
}
