use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Process-wide defaults applied to a submission's execution constraints
/// whenever the submission itself leaves a field null.
///
/// Mirrors the `SANDBOX_*` settings of the service this crate judges
/// submissions for; see `AppConfig::from_env` for the environment
/// variable names.
#[derive(Debug, Clone)]
pub struct SandboxDefaults {
  pub cpu_time_limit: f64,
  pub cpu_extra_time: f64,
  pub wall_time_limit: f64,
  pub memory_limit: u32,
  pub max_processes: u32,
  pub max_file_size: u32,
  pub number_of_runs: u32,
  pub enable_per_process_time_limit: bool,
  pub enable_per_process_memory_limit: bool,
  pub redirect_stderr_to_stdout: bool,
  pub enable_network: bool,
}

impl Default for SandboxDefaults {
  fn default() -> Self {
    Self {
      cpu_time_limit: 1.0,
      cpu_extra_time: 0.5,
      wall_time_limit: 5.0,
      memory_limit: 256_000,
      max_processes: 64,
      max_file_size: 8192,
      number_of_runs: 1,
      enable_per_process_time_limit: false,
      enable_per_process_memory_limit: false,
      redirect_stderr_to_stdout: false,
      enable_network: false,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStrategy {
  FixedWindow,
  SlidingWindow,
}

impl std::str::FromStr for RateLimitStrategy {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "fixed-window" => Ok(Self::FixedWindow),
      "sliding-window" => Ok(Self::SlidingWindow),
      other => Err(Error::Validation(format!(
        "unknown rate limit strategy: {other}"
      ))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
  pub enabled: bool,
  pub per_minute: u64,
  pub per_hour: u64,
  pub strategy: RateLimitStrategy,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      per_minute: 60,
      per_hour: 1000,
      strategy: RateLimitStrategy::FixedWindow,
    }
  }
}

/// Top-level process configuration, assembled once at binary startup from
/// the environment and threaded down to every component that needs it.
#[derive(Debug, Clone)]
pub struct AppConfig {
  pub database_url: String,
  pub redis_host: String,
  pub redis_port: u16,
  pub redis_prefix: String,
  pub isolate_binary: PathBuf,
  pub sandbox_defaults: SandboxDefaults,
  pub rate_limit: RateLimitConfig,
  pub worker_stale_seconds: i64,
}

fn env_or(key: &str, default: &str) -> String {
  env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
  env::var(key)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

impl AppConfig {
  /// Loads configuration from the process environment. `DATABASE_URL` is
  /// the only variable with no hardcoded fallback; everything else
  /// inherits the defaults laid out in SPEC_FULL.md's configuration table.
  pub fn from_env() -> Result<Self> {
    let database_url = env::var("DATABASE_URL")
      .map_err(|_| Error::Validation("DATABASE_URL must be set".into()))?;

    let strategy = env::var("RATE_LIMIT_STRATEGY")
      .ok()
      .map(|s| s.parse())
      .transpose()?
      .unwrap_or(RateLimitStrategy::FixedWindow);

    Ok(Self {
      database_url,
      redis_host: env_or("REDIS_HOST", "127.0.0.1"),
      redis_port: env_parse("REDIS_PORT", 6379),
      redis_prefix: env_or("REDIS_PREFIX", "judge"),
      isolate_binary: PathBuf::from(env_or("ISOLATE_BINARY", "/usr/local/bin/isolate")),
      sandbox_defaults: SandboxDefaults {
        cpu_time_limit: env_parse("SANDBOX_CPU_TIME_LIMIT", 1.0),
        cpu_extra_time: env_parse("SANDBOX_CPU_EXTRA_TIME", 0.5),
        wall_time_limit: env_parse("SANDBOX_WALL_TIME_LIMIT", 5.0),
        memory_limit: env_parse("SANDBOX_MEMORY_LIMIT", 256_000),
        max_processes: env_parse("SANDBOX_MAX_PROCESSES", 64),
        max_file_size: env_parse("SANDBOX_MAX_FILE_SIZE", 8192),
        number_of_runs: env_parse("SANDBOX_NUMBER_OF_RUNS", 1),
        enable_per_process_time_limit: env_parse(
          "SANDBOX_ENABLE_PER_PROCESS_TIME_LIMIT",
          false,
        ),
        enable_per_process_memory_limit: env_parse(
          "SANDBOX_ENABLE_PER_PROCESS_MEMORY_LIMIT",
          false,
        ),
        redirect_stderr_to_stdout: env_parse("SANDBOX_REDIRECT_STDERR_TO_STDOUT", false),
        enable_network: env_parse("SANDBOX_ENABLE_NETWORK", false),
      },
      rate_limit: RateLimitConfig {
        enabled: env_parse("RATE_LIMIT_ENABLED", true),
        per_minute: env_parse("RATE_LIMIT_PER_MINUTE", 60),
        per_hour: env_parse("RATE_LIMIT_PER_HOUR", 1000),
        strategy,
      },
      worker_stale_seconds: env_parse("WORKER_STALE_SECONDS", 60),
    })
  }

  pub fn redis_url(&self) -> String {
    format!("redis://{}:{}", self.redis_host, self.redis_port)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sandbox_defaults_match_isolate_defaults() {
    let d = SandboxDefaults::default();
    assert_eq!(d.cpu_time_limit, 1.0);
    assert_eq!(d.memory_limit, 256_000);
    assert_eq!(d.number_of_runs, 1);
  }

  #[test]
  fn rate_limit_strategy_parses_known_values() {
    assert_eq!(
      "fixed-window".parse::<RateLimitStrategy>().unwrap(),
      RateLimitStrategy::FixedWindow
    );
    assert_eq!(
      "sliding-window".parse::<RateLimitStrategy>().unwrap(),
      RateLimitStrategy::SlidingWindow
    );
    assert!("nonsense".parse::<RateLimitStrategy>().is_err());
  }

  #[test]
  fn redis_url_formats_host_and_port() {
    let mut cfg = AppConfig {
      database_url: "postgres://x".into(),
      redis_host: "redis.internal".into(),
      redis_port: 6380,
      redis_prefix: "judge".into(),
      isolate_binary: PathBuf::from("/usr/local/bin/isolate"),
      sandbox_defaults: SandboxDefaults::default(),
      rate_limit: RateLimitConfig::default(),
      worker_stale_seconds: 60,
    };
    assert_eq!(cfg.redis_url(), "redis://redis.internal:6380");
    cfg.redis_port = 6379;
    assert_eq!(cfg.redis_url(), "redis://redis.internal:6379");
  }
}
