use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::SharedState;

pub async fn list(
  State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
  let languages = state
    .languages
    .list()
    .await
    .map_err(super::submissions::error_response)?;

  Ok(Json(json!(languages)))
}

pub async fn get(
  State(state): State<SharedState>,
  Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
  let language = state
    .languages
    .get(id)
    .await
    .map_err(super::submissions::error_response)?;

  Ok(Json(json!(language)))
}
