use redis::AsyncCommands;

use crate::error::Result;
use crate::models::SubmissionSnapshot;

/// Redis-list-backed job queue. `enqueue` pushes an immutable snapshot
/// of the submission and its language so a worker never re-reads the
/// database mid-job; `dequeue` blocks (with a timeout, so the worker
/// loop can still poll for shutdown) until a job is available.
pub struct SubmissionQueue {
  client: redis::Client,
  key: String,
}

impl SubmissionQueue {
  pub fn new(redis_url: &str, prefix: impl Into<String>) -> Result<Self> {
    Ok(Self {
      client: redis::Client::open(redis_url)?,
      key: format!("{}:queue:submissions", prefix.into()),
    })
  }

  pub async fn enqueue(&self, snapshot: &SubmissionSnapshot) -> Result<()> {
    let mut conn = self.client.get_multiplexed_async_connection().await?;
    let payload = serde_json::to_string(snapshot)?;
    conn.lpush::<_, _, ()>(&self.key, payload).await?;
    Ok(())
  }

  /// Blocks up to `timeout_seconds` waiting for a job. Returns `None`
  /// on timeout so callers can loop and check for shutdown signals.
  pub async fn dequeue(&self, timeout_seconds: f64) -> Result<Option<SubmissionSnapshot>> {
    let mut conn = self.client.get_multiplexed_async_connection().await?;
    let result: Option<(String, String)> = conn.brpop(&self.key, timeout_seconds).await?;

    match result {
      Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
      None => Ok(None),
    }
  }

  pub async fn depth(&self) -> Result<i64> {
    let mut conn = self.client.get_multiplexed_async_connection().await?;
    Ok(conn.llen(&self.key).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{Language, Submission, SubmissionStatus};
  use chrono::Utc;
  use std::collections::HashMap;
  use uuid::Uuid;

  fn sample_snapshot() -> SubmissionSnapshot {
    SubmissionSnapshot {
      submission: Submission {
        id: Uuid::new_v4(),
        language_id: 1,
        source_code: "print(1)".into(),
        stdin: None,
        additional_files: vec![],
        expected_output: None,
        cpu_time_limit: None,
        cpu_extra_time: None,
        wall_time_limit: None,
        memory_limit: None,
        max_processes_and_or_threads: None,
        max_file_size: None,
        number_of_runs: None,
        enable_per_process_and_thread_time_limit: None,
        enable_per_process_and_thread_memory_limit: None,
        redirect_stderr_to_stdout: None,
        enable_network: None,
        status: SubmissionStatus::Pending,
        stdout: None,
        stderr: None,
        compile_output: None,
        meta: HashMap::new(),
        created_at: Utc::now(),
      },
      language: Language {
        id: 1,
        name: "Python".into(),
        version: "3.11".into(),
        file_name: "main".into(),
        file_extension: ".py".into(),
        compile_command: None,
        run_command: "python3 main.py".into(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
      },
    }
  }

  #[test]
  fn snapshot_round_trips_through_json() {
    let snapshot = sample_snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();
    let decoded: SubmissionSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.submission.id, snapshot.submission.id);
    assert_eq!(decoded.language.run_command, snapshot.language.run_command);
  }

  #[test]
  fn queue_key_is_namespaced_by_prefix() {
    let queue = SubmissionQueue::new("redis://127.0.0.1:6379", "judge").unwrap();
    assert_eq!(queue.key, "judge:queue:submissions");
  }
}
