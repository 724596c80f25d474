use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation error: {0}")]
  Validation(String),
  #[error("not found: {0}")]
  NotFound(String),
  #[error("request timed out waiting for submission to finish")]
  Timeout,
  #[error("rate limited")]
  RateLimited(RateLimitInfo),
  #[error("sandbox initialization failed: {0}")]
  SandboxInit(String),
  #[error("sandbox execution failed: {0}")]
  Execution(String),
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
  #[error("queue error: {0}")]
  Queue(#[from] redis::RedisError),
  #[error("serialization error: {0}")]
  Serde(#[from] serde_json::Error),
  #[error("filesystem error: {0}")]
  Filesystem(#[from] std::io::Error),
  #[error("invalid base64: {0}")]
  InvalidBase64(#[from] base64::DecodeError),
}

/// Snapshot of limiter state attached to a denial, used to populate
/// the `X-RateLimit-*`/`Retry-After` headers and the 429 JSON body.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
  pub limit: u64,
  pub remaining: u64,
  pub reset: i64,
  pub retry_after: i64,
}

pub type Result<T> = std::result::Result<T, Error>;
