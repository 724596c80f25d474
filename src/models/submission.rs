use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionStatus {
  Pending,
  Processing,
  Finished,
  Error,
}

impl SubmissionStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Finished | Self::Error)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalFile {
  pub name: String,
  pub content: String,
}

/// The full row shape. Constraint/flag fields are nullable: a null means
/// "defer to the process sandbox defaults", never "zero" or "false".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
  pub id: Uuid,
  pub language_id: i32,
  pub source_code: String,
  pub stdin: Option<String>,
  pub additional_files: Vec<AdditionalFile>,
  pub expected_output: Option<String>,

  pub cpu_time_limit: Option<f64>,
  pub cpu_extra_time: Option<f64>,
  pub wall_time_limit: Option<f64>,
  pub memory_limit: Option<i64>,
  pub max_processes_and_or_threads: Option<i32>,
  pub max_file_size: Option<i64>,
  pub number_of_runs: Option<i32>,
  pub enable_per_process_and_thread_time_limit: Option<bool>,
  pub enable_per_process_and_thread_memory_limit: Option<bool>,
  pub redirect_stderr_to_stdout: Option<bool>,
  pub enable_network: Option<bool>,

  pub status: SubmissionStatus,
  pub stdout: Option<String>,
  pub stderr: Option<String>,
  pub compile_output: Option<String>,
  pub meta: HashMap<String, String>,
  pub created_at: DateTime<Utc>,
}

/// Raw database row; `sqlx::FromRow` can't derive directly onto
/// `Submission` because `additional_files`/`meta` are stored as JSON
/// columns and need an explicit conversion step.
#[derive(Debug, sqlx::FromRow)]
pub struct SubmissionRow {
  pub id: Uuid,
  pub language_id: i32,
  pub source_code: String,
  pub stdin: Option<String>,
  pub additional_files: serde_json::Value,
  pub expected_output: Option<String>,
  pub cpu_time_limit: Option<f64>,
  pub cpu_extra_time: Option<f64>,
  pub wall_time_limit: Option<f64>,
  pub memory_limit: Option<i64>,
  pub max_processes_and_or_threads: Option<i32>,
  pub max_file_size: Option<i64>,
  pub number_of_runs: Option<i32>,
  pub enable_per_process_and_thread_time_limit: Option<bool>,
  pub enable_per_process_and_thread_memory_limit: Option<bool>,
  pub redirect_stderr_to_stdout: Option<bool>,
  pub enable_network: Option<bool>,
  pub status: SubmissionStatus,
  pub stdout: Option<String>,
  pub stderr: Option<String>,
  pub compile_output: Option<String>,
  pub meta: serde_json::Value,
  pub created_at: DateTime<Utc>,
}

impl From<SubmissionRow> for Submission {
  fn from(row: SubmissionRow) -> Self {
    let additional_files: Vec<AdditionalFile> =
      serde_json::from_value(row.additional_files).unwrap_or_default();
    let meta: HashMap<String, String> = serde_json::from_value(row.meta).unwrap_or_default();

    Self {
      id: row.id,
      language_id: row.language_id,
      source_code: row.source_code,
      stdin: row.stdin,
      additional_files,
      expected_output: row.expected_output,
      cpu_time_limit: row.cpu_time_limit,
      cpu_extra_time: row.cpu_extra_time,
      wall_time_limit: row.wall_time_limit,
      memory_limit: row.memory_limit,
      max_processes_and_or_threads: row.max_processes_and_or_threads,
      max_file_size: row.max_file_size,
      number_of_runs: row.number_of_runs,
      enable_per_process_and_thread_time_limit: row.enable_per_process_and_thread_time_limit,
      enable_per_process_and_thread_memory_limit: row.enable_per_process_and_thread_memory_limit,
      redirect_stderr_to_stdout: row.redirect_stderr_to_stdout,
      enable_network: row.enable_network,
      status: row.status,
      stdout: row.stdout,
      stderr: row.stderr,
      compile_output: row.compile_output,
      meta,
      created_at: row.created_at,
    }
  }
}

/// Immutable copy of a submission plus its language, captured at enqueue
/// time and carried through the queue so a worker never re-reads the
/// database mid-job and never races a concurrent edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSnapshot {
  pub submission: Submission,
  pub language: super::language::Language,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_terminality() {
    assert!(!SubmissionStatus::Pending.is_terminal());
    assert!(!SubmissionStatus::Processing.is_terminal());
    assert!(SubmissionStatus::Finished.is_terminal());
    assert!(SubmissionStatus::Error.is_terminal());
  }
}
