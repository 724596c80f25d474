use redis::AsyncCommands;

use crate::config::{RateLimitConfig, RateLimitStrategy};
use crate::error::RateLimitInfo;

#[derive(Debug, Clone)]
pub struct Decision {
  pub allowed: bool,
  pub limit: u64,
  pub remaining: u64,
  pub reset: i64,
  pub retry_after: Option<i64>,
}

impl Decision {
  pub fn allow(limit: u64, remaining: u64, reset: i64) -> Self {
    Self {
      allowed: true,
      limit,
      remaining,
      reset,
      retry_after: None,
    }
  }

  pub fn deny(limit: u64, reset: i64) -> Self {
    Self {
      allowed: false,
      limit,
      remaining: 0,
      reset,
      retry_after: Some((reset - now()).max(0)),
    }
  }

  pub fn as_rate_limit_info(&self) -> RateLimitInfo {
    RateLimitInfo {
      limit: self.limit,
      remaining: self.remaining,
      reset: self.reset,
      retry_after: self.retry_after.unwrap_or(0),
    }
  }
}

fn now() -> i64 {
  chrono::Utc::now().timestamp()
}

const EXEMPT_PREFIXES: &[&str] = &["/docs", "/redoc", "/openapi.json", "/health"];

pub fn is_exempt_path(path: &str) -> bool {
  if path.is_empty() || path == "/" {
    return true;
  }
  EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Resolves the identity a rate-limit bucket is keyed on: an
/// authenticated user id, failing that the first `X-Forwarded-For`
/// entry, failing that the direct peer address, failing that the
/// literal string "unknown".
pub fn client_identity(
  user_id: Option<&str>,
  forwarded_for: Option<&str>,
  peer_addr: Option<&str>,
) -> String {
  if let Some(id) = user_id {
    return format!("user:{id}");
  }
  if let Some(xff) = forwarded_for {
    if let Some(first) = xff.split(',').next().map(str::trim) {
      if !first.is_empty() {
        return format!("ip:{first}");
      }
    }
  }
  if let Some(addr) = peer_addr {
    return format!("ip:{addr}");
  }
  "ip:unknown".to_string()
}

/// Redis-backed fixed-window and sliding-window rate limiter. Any
/// internal (connection, protocol) error fails open: the caller is
/// admitted and the error is logged, never surfaced to the client.
pub struct RateLimiter {
  client: redis::Client,
  prefix: String,
  config: RateLimitConfig,
}

impl RateLimiter {
  pub fn new(redis_url: &str, prefix: impl Into<String>, config: RateLimitConfig) -> Result<Self, redis::RedisError> {
    Ok(Self {
      client: redis::Client::open(redis_url)?,
      prefix: prefix.into(),
      config,
    })
  }

  /// Checks both the per-minute and per-hour buckets for `identity`,
  /// using whichever window strategy this limiter was configured with.
  /// Denies admission if either bucket is exhausted.
  pub async fn check(&self, identity: &str) -> Decision {
    if !self.config.enabled {
      return Decision::allow(self.config.per_minute, self.config.per_minute, now() + 60);
    }

    match self.check_fallible(identity).await {
      Ok(decision) => decision,
      Err(err) => {
        tracing::error!(error = %err, "rate limiter failed, admitting request");
        Decision::allow(self.config.per_minute, self.config.per_minute, now() + 60)
      }
    }
  }

  async fn check_fallible(&self, identity: &str) -> Result<Decision, redis::RedisError> {
    let mut conn = self.client.get_multiplexed_async_connection().await?;

    let minute = self
      .check_window(&mut conn, identity, 60, self.config.per_minute)
      .await?;
    if !minute.allowed {
      return Ok(minute);
    }

    self
      .check_window(&mut conn, identity, 3600, self.config.per_hour)
      .await
  }

  async fn check_window(
    &self,
    conn: &mut redis::aio::MultiplexedConnection,
    identity: &str,
    window_seconds: i64,
    limit: u64,
  ) -> Result<Decision, redis::RedisError> {
    match self.config.strategy {
      RateLimitStrategy::FixedWindow => {
        self.check_fixed_window(conn, identity, window_seconds, limit).await
      }
      RateLimitStrategy::SlidingWindow => {
        self.check_sliding_window(conn, identity, window_seconds, limit).await
      }
    }
  }

  async fn check_fixed_window(
    &self,
    conn: &mut redis::aio::MultiplexedConnection,
    identity: &str,
    window_seconds: i64,
    limit: u64,
  ) -> Result<Decision, redis::RedisError> {
    let bucket = now() / window_seconds;
    let key = format!(
      "{}:fixed:{}:{}:{}",
      self.prefix, identity, window_seconds, bucket
    );

    let (count,): (i64,) = redis::pipe()
      .atomic()
      .incr(&key, 1)
      .expire(&key, window_seconds)
      .ignore()
      .query_async(conn)
      .await?;

    let reset = (bucket + 1) * window_seconds;

    if count as u64 > limit {
      Ok(Decision::deny(limit, reset))
    } else {
      Ok(Decision::allow(limit, limit - count as u64, reset))
    }
  }

  async fn check_sliding_window(
    &self,
    conn: &mut redis::aio::MultiplexedConnection,
    identity: &str,
    window_seconds: i64,
    limit: u64,
  ) -> Result<Decision, redis::RedisError> {
    let key = format!("{}:sliding:{}:{}", self.prefix, identity, window_seconds);
    let current = now();
    let floor = current - window_seconds;

    let _: () = conn.zrembyscore(&key, 0, floor).await?;
    let cardinality: i64 = conn.zcard(&key).await?;

    // The add-and-refresh-expiry step runs on every request, admitted or
    // not, so a denied request's timestamp still occupies the window.
    // Only the admission decision is gated on the pre-add cardinality.
    let member = format!("{current}-{}", uuid::Uuid::new_v4());
    let _: () = conn.zadd(&key, member, current).await?;
    let _: () = conn.expire(&key, window_seconds).await?;

    if cardinality as u64 >= limit {
      let oldest: Vec<(String, f64)> = conn.zrangebyscore_withscores(&key, "-inf", "+inf").await?;
      let reset = oldest
        .first()
        .map(|(_, score)| *score as i64 + window_seconds)
        .unwrap_or(current + window_seconds);
      return Ok(Decision::deny(limit, reset));
    }

    Ok(Decision::allow(
      limit,
      limit - (cardinality as u64 + 1),
      current + window_seconds,
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn root_and_docs_paths_are_exempt() {
    assert!(is_exempt_path("/"));
    assert!(is_exempt_path(""));
    assert!(is_exempt_path("/docs"));
    assert!(is_exempt_path("/docs/oauth2-redirect"));
    assert!(is_exempt_path("/redoc"));
    assert!(is_exempt_path("/openapi.json"));
    assert!(is_exempt_path("/health"));
    assert!(is_exempt_path("/health/live"));
  }

  #[test]
  fn other_paths_are_not_exempt() {
    assert!(!is_exempt_path("/submissions/"));
    assert!(!is_exempt_path("/languages/"));
  }

  #[test]
  fn identity_prefers_user_id() {
    assert_eq!(
      client_identity(Some("u1"), Some("1.2.3.4"), Some("5.6.7.8")),
      "user:u1"
    );
  }

  #[test]
  fn identity_falls_back_to_forwarded_for_then_peer_then_unknown() {
    assert_eq!(
      client_identity(None, Some("1.2.3.4, 5.6.7.8"), Some("9.9.9.9")),
      "ip:1.2.3.4"
    );
    assert_eq!(client_identity(None, None, Some("9.9.9.9")), "ip:9.9.9.9");
    assert_eq!(client_identity(None, None, None), "ip:unknown");
  }

  #[test]
  fn deny_sets_retry_after_from_reset() {
    let decision = Decision::deny(10, now() + 30);
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0);
    assert!(decision.retry_after.unwrap() > 0);
  }
}
