use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::app::errors;

/// Upper bound on a single request.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimeout(pub Duration);

/// Fail the request once the limit elapses. Storage steps that already
/// committed stay committed.
pub async fn timeout_middleware(
    State(RequestTimeout(limit)): State<RequestTimeout>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(%method, %path, limit_ms = limit.as_millis() as u64, "request timed out");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "request timed out")
        }
    }
}
