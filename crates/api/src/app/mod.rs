//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage selection and service construction
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs, body extraction and the success envelope
//! - `errors.rs`: error envelope and status mapping

use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware::{self, RequestTimeout};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices, request_timeout: Duration) -> Router {
    let services = Arc::new(services);

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    RequestTimeout(request_timeout),
                    middleware::timeout_middleware,
                )),
        )
}
