use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_core::DomainError;
use stockroom_infra::ServiceError;

/// Status code a domain failure is reported with.
pub fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_)
        | DomainError::NotFound { .. }
        | DomainError::TagNotFound(_)
        | DomainError::InvalidQuantity(_)
        | DomainError::Cycle { .. } => StatusCode::BAD_REQUEST,
        DomainError::DuplicateKey(_) | DomainError::RangeViolation { .. } => StatusCode::CONFLICT,
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => json_error(domain_status(&e), e.to_string()),
        ServiceError::AreaDeletionIncomplete { deleted, failures } => {
            tracing::error!(
                deleted = deleted.len(),
                failed = failures.len(),
                "area deletion left areas behind"
            );
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            (
                status,
                axum::Json(json!({
                    "status": "error",
                    "message": format!("{} areas could not be deleted", failures.len()),
                    "code": status.as_u16(),
                    "deleted": deleted.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
                    "failed": failures.iter().map(|f| f.area.to_string()).collect::<Vec<_>>(),
                })),
            )
                .into_response()
        }
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "unclassified failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

/// Malformed or unparseable request bodies.
pub fn rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, rejection.body_text())
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "status": "error",
            "message": message.into(),
            "code": status.as_u16(),
        })),
    )
        .into_response()
}
