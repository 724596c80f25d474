use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::codec;
use crate::error::Error;
use crate::models::{AdditionalFile, Submission, SubmissionSnapshot};
use crate::repository::NewSubmission;

use super::SharedState;

pub fn error_response(err: Error) -> (StatusCode, Json<Value>) {
  let status = match &err {
    Error::Validation(_) | Error::InvalidBase64(_) => StatusCode::BAD_REQUEST,
    Error::NotFound(_) => StatusCode::NOT_FOUND,
    Error::Timeout => StatusCode::REQUEST_TIMEOUT,
    Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
    _ => StatusCode::INTERNAL_SERVER_ERROR,
  };

  (status, Json(json!({"error": err.to_string()})))
}

#[derive(Debug, Deserialize)]
pub struct AdditionalFileInput {
  pub name: String,
  pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
  pub source_code: String,
  pub language_id: i32,
  pub stdin: Option<String>,
  #[serde(default)]
  pub additional_files: Vec<AdditionalFileInput>,
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
}

#[derive(Debug, Deserialize)]
pub struct CreateQuery {
  #[serde(default)]
  pub base64_encoded: bool,
  #[serde(default)]
  pub wait: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReadQuery {
  #[serde(default)]
  pub base64_encoded: bool,
  pub fields: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
  #[serde(default = "default_page")]
  pub page: u32,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  #[serde(default)]
  pub base64_encoded: bool,
  pub fields: Option<String>,
}

fn default_page() -> u32 {
  1
}

fn default_page_size() -> u32 {
  25
}

fn decode_request(
  mut req: CreateSubmissionRequest,
  base64_encoded: bool,
) -> Result<CreateSubmissionRequest, Error> {
  if base64_encoded {
    req.source_code = codec::decode(&req.source_code)?;
    req.stdin = codec::decode_opt(req.stdin.as_deref())?;
    for file in &mut req.additional_files {
      file.content = codec::decode(&file.content)?;
    }
  }
  Ok(req)
}

fn validate_request(req: &CreateSubmissionRequest) -> Result<(), Error> {
  crate::ensure!(
    !req.source_code.trim().is_empty(),
    Error::Validation("source_code must not be empty".into())
  );

  for file in &req.additional_files {
    crate::path_ext::validate_relative_file_name(&file.name)?;
  }

  let positive_or_none = |v: Option<f64>, name: &str| -> Result<(), Error> {
    if let Some(v) = v {
      crate::ensure!(v > 0.0, Error::Validation(format!("{name} must be positive")));
    }
    Ok(())
  };

  positive_or_none(req.cpu_time_limit, "cpu_time_limit")?;
  positive_or_none(req.cpu_extra_time, "cpu_extra_time")?;
  positive_or_none(req.wall_time_limit, "wall_time_limit")?;

  if let Some(n) = req.number_of_runs {
    crate::ensure!(n >= 1, Error::Validation("number_of_runs must be >= 1".into()));
  }

  Ok(())
}

fn submission_to_json(submission: &Submission, base64_encoded: bool, fields: &std::collections::HashSet<String>) -> Value {
  let mut map = serde_json::Map::new();

  let text = |s: &Option<String>| -> Value {
    match s {
      None => Value::Null,
      Some(s) => {
        if base64_encoded {
          Value::String(codec::encode(s))
        } else {
          Value::String(s.clone())
        }
      }
    }
  };

  macro_rules! put {
    ($name:expr, $value:expr) => {
      if fields.contains($name) {
        map.insert($name.to_string(), $value);
      }
    };
  }

  put!("id", json!(submission.id));
  put!("language_id", json!(submission.language_id));
  put!(
    "source_code",
    if base64_encoded {
      json!(codec::encode(&submission.source_code))
    } else {
      json!(submission.source_code)
    }
  );
  put!("stdin", text(&submission.stdin));
  put!("expected_output", text(&submission.expected_output));
  put!(
    "additional_files",
    json!(submission
      .additional_files
      .iter()
      .map(|f| json!({
        "name": f.name,
        "content": if base64_encoded { codec::encode(&f.content) } else { f.content.clone() },
      }))
      .collect::<Vec<_>>())
  );
  put!("cpu_time_limit", json!(submission.cpu_time_limit));
  put!("cpu_extra_time", json!(submission.cpu_extra_time));
  put!("wall_time_limit", json!(submission.wall_time_limit));
  put!("memory_limit", json!(submission.memory_limit));
  put!(
    "max_processes_and_or_threads",
    json!(submission.max_processes_and_or_threads)
  );
  put!("max_file_size", json!(submission.max_file_size));
  put!("number_of_runs", json!(submission.number_of_runs));
  put!(
    "enable_per_process_and_thread_time_limit",
    json!(submission.enable_per_process_and_thread_time_limit)
  );
  put!(
    "enable_per_process_and_thread_memory_limit",
    json!(submission.enable_per_process_and_thread_memory_limit)
  );
  put!(
    "redirect_stderr_to_stdout",
    json!(submission.redirect_stderr_to_stdout)
  );
  put!("enable_network", json!(submission.enable_network));
  put!("status", json!(submission.status));
  put!("stdout", text(&submission.stdout));
  put!("stderr", text(&submission.stderr));
  put!("compile_output", text(&submission.compile_output));
  put!("meta", json!(submission.meta));
  put!("created_at", json!(submission.created_at));

  Value::Object(map)
}

pub async fn create(
  State(state): State<SharedState>,
  Query(query): Query<CreateQuery>,
  Json(req): Json<CreateSubmissionRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
  let req = decode_request(req, query.base64_encoded).map_err(error_response)?;
  validate_request(&req).map_err(error_response)?;

  let language = state
    .languages
    .get(req.language_id)
    .await
    .map_err(|_| error_response(Error::Validation("unsupported language".into())))?;

  let id = Uuid::new_v4();
  let additional_files: Vec<AdditionalFile> = req
    .additional_files
    .iter()
    .map(|f| AdditionalFile {
      name: f.name.clone(),
      content: f.content.clone(),
    })
    .collect();
  let additional_files_json = serde_json::to_value(&additional_files).unwrap_or(json!([]));

  state
    .submissions
    .create(NewSubmission {
      id,
      language_id: req.language_id,
      source_code: &req.source_code,
      stdin: req.stdin.as_deref(),
      additional_files: additional_files_json,
      expected_output: req.expected_output.as_deref(),
      cpu_time_limit: req.cpu_time_limit,
      cpu_extra_time: req.cpu_extra_time,
      wall_time_limit: req.wall_time_limit,
      memory_limit: req.memory_limit,
      max_processes_and_or_threads: req.max_processes_and_or_threads,
      max_file_size: req.max_file_size,
      number_of_runs: req.number_of_runs,
      enable_per_process_and_thread_time_limit: req.enable_per_process_and_thread_time_limit,
      enable_per_process_and_thread_memory_limit: req.enable_per_process_and_thread_memory_limit,
      redirect_stderr_to_stdout: req.redirect_stderr_to_stdout,
      enable_network: req.enable_network,
    })
    .await
    .map_err(error_response)?;

  let submission = state.submissions.get_by_id(id).await.map_err(error_response)?;

  state
    .queue
    .enqueue(&SubmissionSnapshot {
      submission: submission.clone(),
      language,
    })
    .await
    .map_err(error_response)?;

  if !query.wait {
    return Ok(Json(json!({"id": id})));
  }

  let deadline = std::time::Instant::now() + Duration::from_secs(15);
  loop {
    let current = state.submissions.get_by_id(id).await.map_err(error_response)?;
    if current.status.is_terminal() {
      let fields = codec::parse_fields(Some("all"));
      return Ok(Json(submission_to_json(&current, query.base64_encoded, &fields)));
    }
    if std::time::Instant::now() >= deadline {
      return Err(error_response(Error::Timeout));
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
  }
}

pub async fn create_batch(
  State(state): State<SharedState>,
  Query(query): Query<CreateQuery>,
  Json(reqs): Json<Vec<CreateSubmissionRequest>>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
  let mut decoded = Vec::with_capacity(reqs.len());
  for req in reqs {
    let req = decode_request(req, query.base64_encoded).map_err(error_response)?;
    validate_request(&req).map_err(error_response)?;
    decoded.push(req);
  }

  let mut language_cache: HashMap<i32, crate::models::Language> = HashMap::new();
  for req in &decoded {
    if !language_cache.contains_key(&req.language_id) {
      let language = state
        .languages
        .get(req.language_id)
        .await
        .map_err(|_| error_response(Error::Validation("unsupported language".into())))?;
      language_cache.insert(req.language_id, language);
    }
  }

  let mut ids = Vec::with_capacity(decoded.len());
  for req in decoded {
    let id = Uuid::new_v4();
    let additional_files: Vec<AdditionalFile> = req
      .additional_files
      .iter()
      .map(|f| AdditionalFile {
        name: f.name.clone(),
        content: f.content.clone(),
      })
      .collect();
    let additional_files_json = serde_json::to_value(&additional_files).unwrap_or(json!([]));

    state
      .submissions
      .create(NewSubmission {
        id,
        language_id: req.language_id,
        source_code: &req.source_code,
        stdin: req.stdin.as_deref(),
        additional_files: additional_files_json,
        expected_output: req.expected_output.as_deref(),
        cpu_time_limit: req.cpu_time_limit,
        cpu_extra_time: req.cpu_extra_time,
        wall_time_limit: req.wall_time_limit,
        memory_limit: req.memory_limit,
        max_processes_and_or_threads: req.max_processes_and_or_threads,
        max_file_size: req.max_file_size,
        number_of_runs: req.number_of_runs,
        enable_per_process_and_thread_time_limit: req.enable_per_process_and_thread_time_limit,
        enable_per_process_and_thread_memory_limit: req.enable_per_process_and_thread_memory_limit,
        redirect_stderr_to_stdout: req.redirect_stderr_to_stdout,
        enable_network: req.enable_network,
      })
      .await
      .map_err(error_response)?;

    let submission = state.submissions.get_by_id(id).await.map_err(error_response)?;
    let language = language_cache.get(&req.language_id).unwrap().clone();

    state
      .queue
      .enqueue(&SubmissionSnapshot { submission, language })
      .await
      .map_err(error_response)?;

    ids.push(id);
  }

  Ok((StatusCode::CREATED, Json(json!(ids))))
}

#[derive(Debug, Deserialize)]
pub struct BatchIdsQuery {
  pub ids: String,
  #[serde(default)]
  pub base64_encoded: bool,
  pub fields: Option<String>,
}

pub async fn get_batch(
  State(state): State<SharedState>,
  Query(query): Query<BatchIdsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
  let mut ids = Vec::new();
  for raw in query.ids.split(',') {
    let raw = raw.trim();
    if raw.is_empty() {
      continue;
    }
    let id = Uuid::parse_str(raw)
      .map_err(|_| error_response(Error::Validation(format!("invalid id: {raw}"))))?;
    ids.push(id);
  }

  let submissions = state.submissions.get_by_ids(&ids).await.map_err(error_response)?;
  let fields = codec::parse_fields(query.fields.as_deref());

  let out: Vec<Value> = submissions
    .iter()
    .map(|s| submission_to_json(s, query.base64_encoded, &fields))
    .collect();

  Ok(Json(json!(out)))
}

pub async fn get(
  State(state): State<SharedState>,
  Path(id): Path<Uuid>,
  Query(query): Query<ReadQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
  let submission = state.submissions.get_by_id(id).await.map_err(error_response)?;
  let fields = codec::parse_fields(query.fields.as_deref());
  Ok(Json(submission_to_json(&submission, query.base64_encoded, &fields)))
}

pub async fn list(
  State(state): State<SharedState>,
  Query(query): Query<ListQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
  let page_size = query.page_size.clamp(1, 100);
  let page = query.page.max(1);

  let (submissions, total) = state
    .submissions
    .list_paginated(page, page_size)
    .await
    .map_err(error_response)?;

  let fields = codec::parse_fields(query.fields.as_deref());
  let items: Vec<Value> = submissions
    .iter()
    .map(|s| submission_to_json(s, query.base64_encoded, &fields))
    .collect();

  let total_pages = (total as u32 + page_size - 1) / page_size.max(1);

  Ok(Json(json!({
    "items": items,
    "current_page": page,
    "page_size": page_size,
    "total_items": total,
    "total_pages": total_pages,
  })))
}

pub async fn delete(
  State(state): State<SharedState>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
  state.submissions.delete(id).await.map_err(error_response)?;
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn total_pages_rounds_up() {
    let total: i64 = 101;
    let page_size: u32 = 25;
    let total_pages = (total as u32 + page_size - 1) / page_size;
    assert_eq!(total_pages, 5);
  }

  #[test]
  fn validate_request_rejects_blank_source() {
    let req = CreateSubmissionRequest {
      source_code: "   ".into(),
      language_id: 1,
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
    };
    assert!(validate_request(&req).is_err());
  }

  #[test]
  fn validate_request_rejects_non_positive_limits() {
    let mut req = CreateSubmissionRequest {
      source_code: "x".into(),
      language_id: 1,
      stdin: None,
      additional_files: vec![],
      expected_output: None,
      cpu_time_limit: Some(0.0),
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
    };
    assert!(validate_request(&req).is_err());
    req.cpu_time_limit = Some(1.0);
    assert!(validate_request(&req).is_ok());
  }
}
