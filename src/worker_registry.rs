use redis::AsyncCommands;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct WorkerInfo {
  pub name: String,
  pub heartbeat: i64,
  pub is_stale: bool,
}

/// Redis-backed registry of live workers. Workers heartbeat into it on
/// a timer; an administrative cleanup pass reaps entries whose
/// heartbeat has gone stale (process killed, node lost) without ever
/// touching the currently-assigned job, since the registry only tracks
/// liveness, not work items.
pub struct WorkerRegistry {
  client: redis::Client,
  prefix: String,
}

impl WorkerRegistry {
  pub fn new(redis_url: &str, prefix: impl Into<String>) -> Result<Self> {
    Ok(Self {
      client: redis::Client::open(redis_url)?,
      prefix: prefix.into(),
    })
  }

  fn worker_key(&self, name: &str) -> String {
    format!("{}:worker:{}", self.prefix, name)
  }

  fn workers_set_key(&self) -> String {
    format!("{}:workers", self.prefix)
  }

  pub async fn register(&self, name: &str) -> Result<()> {
    self.heartbeat(name).await?;
    let mut conn = self.client.get_multiplexed_async_connection().await?;
    conn.sadd::<_, _, ()>(self.workers_set_key(), name).await?;
    Ok(())
  }

  pub async fn heartbeat(&self, name: &str) -> Result<()> {
    let mut conn = self.client.get_multiplexed_async_connection().await?;
    let now = chrono::Utc::now().timestamp();
    conn.hset::<_, _, _, ()>(self.worker_key(name), "heartbeat", now).await?;
    Ok(())
  }

  pub async fn deregister(&self, name: &str) -> Result<()> {
    let mut conn = self.client.get_multiplexed_async_connection().await?;
    conn.del::<_, ()>(self.worker_key(name)).await?;
    conn.srem::<_, _, ()>(self.workers_set_key(), name).await?;
    Ok(())
  }

  pub async fn list_workers(&self, stale_after_seconds: i64) -> Result<Vec<WorkerInfo>> {
    let mut conn = self.client.get_multiplexed_async_connection().await?;
    let names: Vec<String> = conn.smembers(self.workers_set_key()).await?;
    let now = chrono::Utc::now().timestamp();

    let mut workers = Vec::with_capacity(names.len());
    for name in names {
      let heartbeat: Option<i64> = conn.hget(self.worker_key(&name), "heartbeat").await?;
      let heartbeat = heartbeat.unwrap_or(0);
      workers.push(WorkerInfo {
        name,
        heartbeat,
        is_stale: now - heartbeat > stale_after_seconds,
      });
    }

    Ok(workers)
  }

  /// Deregisters every worker whose heartbeat is older than
  /// `stale_after_seconds`. Returns the number reaped.
  pub async fn reap_stale(&self, stale_after_seconds: i64) -> Result<usize> {
    let stale: Vec<String> = self
      .list_workers(stale_after_seconds)
      .await?
      .into_iter()
      .filter(|w| w.is_stale)
      .map(|w| w.name)
      .collect();

    for name in &stale {
      self.deregister(name).await?;
    }

    Ok(stale.len())
  }

  pub async fn cleanup_all(&self) -> Result<usize> {
    let mut conn = self.client.get_multiplexed_async_connection().await?;
    let names: Vec<String> = conn.smembers(self.workers_set_key()).await?;
    for name in &names {
      self.deregister(name).await?;
    }
    Ok(names.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn worker_key_namespacing() {
    let registry = WorkerRegistry {
      client: redis::Client::open("redis://127.0.0.1:6379").unwrap(),
      prefix: "judge".to_string(),
    };
    assert_eq!(registry.worker_key("worker-3"), "judge:worker:worker-3");
    assert_eq!(registry.workers_set_key(), "judge:workers");
  }
}
