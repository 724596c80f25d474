use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::SharedState;

/// Liveness probe: confirms the database pool and the queue's Redis
/// connection are both reachable, not just that the process is up.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<serde_json::Value>) {
  let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

  let queue_ok = state.queue.depth().await.is_ok();

  if db_ok && queue_ok {
    (StatusCode::OK, Json(json!({"status": "ok"})))
  } else {
    (
      StatusCode::SERVICE_UNAVAILABLE,
      Json(json!({"status": "unavailable", "database": db_ok, "queue": queue_ok})),
    )
  }
}
