pub mod health;
pub mod languages;
pub mod middleware;
pub mod submissions;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::queue::SubmissionQueue;
use crate::rate_limit::RateLimiter;
use crate::repository::{LanguageRepository, SubmissionRepository};

pub struct AppState {
  pub config: AppConfig,
  pub pool: PgPool,
  pub submissions: SubmissionRepository,
  pub languages: LanguageRepository,
  pub queue: SubmissionQueue,
  pub rate_limiter: RateLimiter,
}

pub type SharedState = Arc<AppState>;

pub fn build_state(config: AppConfig, pool: PgPool) -> anyhow::Result<SharedState> {
  let queue = SubmissionQueue::new(&config.redis_url(), config.redis_prefix.clone())?;
  let rate_limiter = RateLimiter::new(
    &config.redis_url(),
    config.redis_prefix.clone(),
    config.rate_limit.clone(),
  )?;

  Ok(Arc::new(AppState {
    submissions: SubmissionRepository::new(pool.clone()),
    languages: LanguageRepository::new(pool.clone()),
    pool,
    queue,
    rate_limiter,
    config,
  }))
}

pub fn build_router(state: SharedState) -> Router {
  Router::new()
    .route(
      "/submissions/",
      post(submissions::create).get(submissions::list),
    )
    .route(
      "/submissions/batch",
      post(submissions::create_batch).get(submissions::get_batch),
    )
    .route(
      "/submissions/:id",
      get(submissions::get).delete(submissions::delete),
    )
    .route("/languages/", get(languages::list))
    .route("/languages/:id", get(languages::get))
    .route("/health", get(health::health))
    .layer(axum::middleware::from_fn_with_state(
      state.clone(),
      middleware::rate_limit,
    ))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
