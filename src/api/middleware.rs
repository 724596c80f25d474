use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::net::SocketAddr;

use crate::rate_limit::{client_identity, is_exempt_path};

use super::SharedState;

fn header_value(n: impl std::fmt::Display) -> HeaderValue {
  HeaderValue::from_str(&n.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

/// Tower-style middleware wrapping every request: resolves a client
/// identity, skips admission control entirely for exempt paths
/// (health/docs), and otherwise consults the rate limiter before
/// letting the request through. Denials short-circuit with 429 and the
/// `X-RateLimit-*`/`Retry-After` headers; admissions still get the
/// informational headers attached.
pub async fn rate_limit(
  State(state): State<SharedState>,
  connect_info: Option<ConnectInfo<SocketAddr>>,
  request: Request,
  next: Next,
) -> Response {
  let path = request.uri().path().to_string();

  if is_exempt_path(&path) {
    return next.run(request).await;
  }

  let forwarded_for = request
    .headers()
    .get("x-forwarded-for")
    .and_then(|v| v.to_str().ok())
    .map(str::to_string);

  let peer_addr = connect_info.map(|ConnectInfo(addr)| addr.to_string());

  let identity = client_identity(None, forwarded_for.as_deref(), peer_addr.as_deref());
  let decision = state.rate_limiter.check(&identity).await;

  if !decision.allowed {
    let info = decision.as_rate_limit_info();
    let mut response = (
      StatusCode::TOO_MANY_REQUESTS,
      Json(json!({
        "error": "rate_limited",
        "message": "too many requests",
        "limit": info.limit,
        "remaining": info.remaining,
        "reset": info.reset,
        "retry_after": info.retry_after,
      })),
    )
      .into_response();

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", header_value(info.limit));
    headers.insert("X-RateLimit-Remaining", header_value(info.remaining));
    headers.insert("X-RateLimit-Reset", header_value(info.reset.max(0)));
    headers.insert("Retry-After", header_value(info.retry_after.max(0)));

    return response;
  }

  let mut response = next.run(request).await;
  let headers = response.headers_mut();
  headers.insert("X-RateLimit-Limit", header_value(decision.limit));
  headers.insert("X-RateLimit-Remaining", header_value(decision.remaining));
  headers.insert("X-RateLimit-Reset", header_value(decision.reset.max(0)));

  response
}
