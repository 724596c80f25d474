use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Language, LanguageSummary, Submission, SubmissionStatus};
use crate::models::submission::SubmissionRow;

#[derive(Debug, Clone)]
pub struct NewSubmission<'a> {
  pub id: Uuid,
  pub language_id: i32,
  pub source_code: &'a str,
  pub stdin: Option<&'a str>,
  pub additional_files: serde_json::Value,
  pub expected_output: Option<&'a str>,
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
}

pub struct SubmissionRepository {
  pool: PgPool,
}

impl SubmissionRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn create(&self, submission: NewSubmission<'_>) -> Result<()> {
    sqlx::query(
      r#"
      INSERT INTO submissions (
        id, language_id, source_code, stdin, additional_files, expected_output,
        cpu_time_limit, cpu_extra_time, wall_time_limit, memory_limit,
        max_processes_and_or_threads, max_file_size, number_of_runs,
        enable_per_process_and_thread_time_limit, enable_per_process_and_thread_memory_limit,
        redirect_stderr_to_stdout, enable_network, status
      ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, 'PENDING')
      "#,
    )
    .bind(submission.id)
    .bind(submission.language_id)
    .bind(submission.source_code)
    .bind(submission.stdin)
    .bind(submission.additional_files)
    .bind(submission.expected_output)
    .bind(submission.cpu_time_limit)
    .bind(submission.cpu_extra_time)
    .bind(submission.wall_time_limit)
    .bind(submission.memory_limit)
    .bind(submission.max_processes_and_or_threads)
    .bind(submission.max_file_size)
    .bind(submission.number_of_runs)
    .bind(submission.enable_per_process_and_thread_time_limit)
    .bind(submission.enable_per_process_and_thread_memory_limit)
    .bind(submission.redirect_stderr_to_stdout)
    .bind(submission.enable_network)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  pub async fn get_by_id(&self, id: Uuid) -> Result<Submission> {
    let row = sqlx::query_as::<_, SubmissionRow>("SELECT * FROM submissions WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| Error::NotFound(format!("submission {id}")))?;

    Ok(row.into())
  }

  pub async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Submission>> {
    let rows = sqlx::query_as::<_, SubmissionRow>("SELECT * FROM submissions WHERE id = ANY($1)")
      .bind(ids)
      .fetch_all(&self.pool)
      .await?;

    Ok(rows.into_iter().map(Submission::from).collect())
  }

  pub async fn list_paginated(&self, page: u32, page_size: u32) -> Result<(Vec<Submission>, i64)> {
    let offset = (page.saturating_sub(1)) as i64 * page_size as i64;

    let rows = sqlx::query_as::<_, SubmissionRow>(
      "SELECT * FROM submissions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(page_size as i64)
    .bind(offset)
    .fetch_all(&self.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM submissions")
      .fetch_one(&self.pool)
      .await?;

    Ok((rows.into_iter().map(Submission::from).collect(), total.0))
  }

  pub async fn delete(&self, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM submissions WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(format!("submission {id}")));
    }

    Ok(())
  }

  /// Transitions a submission PENDING -> PROCESSING. The `WHERE status =
  /// 'PENDING'` guard makes this idempotent: a duplicate queue delivery
  /// that loses the race simply claims nothing and should abort without
  /// reprocessing the job.
  pub async fn try_start_processing(&self, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE submissions SET status = 'PROCESSING' WHERE id = $1 AND status = 'PENDING'",
    )
    .bind(id)
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() == 1)
  }

  /// Writes the terminal result in one statement: status, stdout,
  /// stderr, compile_output and meta all change together, so a reader
  /// never observes a status flip without its accompanying output.
  #[allow(clippy::too_many_arguments)]
  pub async fn update_result(
    &self,
    id: Uuid,
    status: SubmissionStatus,
    stdout: Option<&str>,
    stderr: Option<&str>,
    compile_output: Option<&str>,
    meta: &HashMap<String, String>,
  ) -> Result<()> {
    let meta_json = serde_json::to_value(meta)?;

    sqlx::query(
      r#"
      UPDATE submissions
      SET status = $2, stdout = $3, stderr = $4, compile_output = $5, meta = $6
      WHERE id = $1
      "#,
    )
    .bind(id)
    .bind(status)
    .bind(stdout)
    .bind(stderr)
    .bind(compile_output)
    .bind(meta_json)
    .execute(&self.pool)
    .await?;

    Ok(())
  }
}

pub struct LanguageRepository {
  pool: PgPool,
}

impl LanguageRepository {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn list(&self) -> Result<Vec<LanguageSummary>> {
    let rows = sqlx::query_as::<_, LanguageSummary>(
      "SELECT id, name, version FROM languages ORDER BY id",
    )
    .fetch_all(&self.pool)
    .await?;

    Ok(rows)
  }

  pub async fn get(&self, id: i32) -> Result<Language> {
    sqlx::query_as::<_, Language>("SELECT * FROM languages WHERE id = $1")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| Error::NotFound(format!("language {id}")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn list_paginated_offset_math() {
    assert_eq!((1u32.saturating_sub(1)) as i64 * 25, 0);
    assert_eq!((3u32.saturating_sub(1)) as i64 * 25, 50);
  }
}
