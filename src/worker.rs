use std::path::PathBuf;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::error::Result;
use crate::processor::Processor;
use crate::queue::SubmissionQueue;
use crate::repository::SubmissionRepository;
use crate::sandbox::{allocate_slot, MaterialSystem};
use crate::worker_registry::WorkerRegistry;

/// Long-lived dequeue loop for a single worker identity. One worker
/// handles one submission at a time; concurrency across submissions
/// comes from running several worker processes side by side, each bound
/// to its own sandbox slot.
pub struct Worker {
  pub identity: String,
  pub box_id: u32,
  pub config: AppConfig,
  pub pool: PgPool,
}

impl Worker {
  pub fn new(identity: impl Into<String>, box_root: &std::path::Path, config: AppConfig, pool: PgPool) -> Self {
    let identity = identity.into();
    let box_id = allocate_slot(&identity, box_root);
    Self {
      identity,
      box_id,
      config,
      pool,
    }
  }

  pub async fn run_forever(&self) -> Result<()> {
    let queue = SubmissionQueue::new(&self.config.redis_url(), self.config.redis_prefix.clone())?;
    let registry = WorkerRegistry::new(&self.config.redis_url(), self.config.redis_prefix.clone())?;
    let repository = SubmissionRepository::new(self.pool.clone());
    let system = MaterialSystem;

    registry.register(&self.identity).await?;
    tracing::info!(worker = %self.identity, box_id = self.box_id, "worker started");

    loop {
      registry.heartbeat(&self.identity).await?;

      let snapshot = match queue.dequeue(5.0).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => continue,
        Err(err) => {
          tracing::error!(error = %err, "queue dequeue failed, retrying");
          continue;
        }
      };

      let processor = Processor {
        repository: &repository,
        isolate_binary: self.config.isolate_binary.clone(),
        defaults: self.config.sandbox_defaults.clone(),
        system: &system,
      };

      match processor.process(self.box_id, &snapshot).await {
        Ok(outcome) => {
          tracing::info!(
            worker = %self.identity,
            submission_id = %snapshot.submission.id,
            outcome = ?outcome,
            "submission processed"
          );
        }
        Err(err) => {
          tracing::error!(
            worker = %self.identity,
            submission_id = %snapshot.submission.id,
            error = %err,
            "processing failed outside the processor's own error handling"
          );
        }
      }
    }
  }

  pub async fn shutdown(&self) -> Result<()> {
    let registry = WorkerRegistry::new(&self.config.redis_url(), self.config.redis_prefix.clone())?;
    registry.deregister(&self.identity).await?;
    Ok(())
  }
}

pub fn default_box_root() -> PathBuf {
  PathBuf::from("/var/local/lib/isolate")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_box_root_matches_isolate_convention() {
    assert_eq!(default_box_root(), PathBuf::from("/var/local/lib/isolate"));
  }
}
