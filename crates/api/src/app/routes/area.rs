use std::sync::Arc;

use axum::{Json, extract::Extension, extract::rejection::JsonRejection, http::StatusCode};
use serde_json::json;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn create_area(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateAreaRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    let area = match services.directory.create_area(body.into()).await {
        Ok(area) => area,
        Err(e) => return errors::service_error_to_response(e),
    };

    match dto::to_json(&area) {
        Ok(changes) => dto::success(
            StatusCode::CREATED,
            format!("Created area #{}", area.public_id),
            json!({ "changes": changes }),
        ),
        Err(res) => res,
    }
}

pub async fn find_areas(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::AreaQueryRequest>, JsonRejection>,
) -> axum::response::Response {
    let query = match dto::query_body(payload) {
        Ok(q) => q,
        Err(res) => return res,
    };

    let areas = match services.directory.find_areas(query.into()).await {
        Ok(areas) => areas,
        Err(e) => return errors::service_error_to_response(e),
    };

    match dto::to_json(&areas) {
        Ok(response) => dto::success(
            StatusCode::OK,
            format!("Found {} areas", areas.len()),
            json!({ "response": response }),
        ),
        Err(res) => res,
    }
}

pub async fn move_area(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::MoveAreaRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    let area = match services.directory.move_area(body.into()).await {
        Ok(area) => area,
        Err(e) => return errors::service_error_to_response(e),
    };

    match dto::to_json(&area) {
        Ok(changes) => dto::success(
            StatusCode::OK,
            format!("Updated area #{}", area.public_id),
            json!({ "changes": changes }),
        ),
        Err(res) => res,
    }
}

pub async fn delete_area(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::DeleteAreaRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    match services.directory.delete_area(&body.id).await {
        Ok(outcome) => dto::success(
            StatusCode::OK,
            format!("Deleted {} areas", outcome.deleted.len()),
            json!({
                "deleted": outcome.deleted.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
                "orphanedItems": outcome.orphaned_items,
            }),
        ),
        Err(e) => errors::service_error_to_response(e),
    }
}
