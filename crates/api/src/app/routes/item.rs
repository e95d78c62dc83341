use std::sync::Arc;

use axum::{Json, extract::Extension, extract::rejection::JsonRejection, http::StatusCode};
use serde_json::json;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    let item = match services.directory.create_item(body.into()).await {
        Ok(item) => item,
        Err(e) => return errors::service_error_to_response(e),
    };

    match dto::to_json(&item) {
        Ok(changes) => dto::success(
            StatusCode::CREATED,
            format!("Created item #{}", item.public_id),
            json!({ "changes": changes }),
        ),
        Err(res) => res,
    }
}

pub async fn find_items(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::ItemQueryRequest>, JsonRejection>,
) -> axum::response::Response {
    let query = match dto::query_body(payload) {
        Ok(q) => q,
        Err(res) => return res,
    };

    let items = match services.directory.find_items(query.into()).await {
        Ok(items) => items,
        Err(e) => return errors::service_error_to_response(e),
    };

    match dto::to_json(&items) {
        Ok(response) => dto::success(
            StatusCode::OK,
            format!("Found {} items", items.len()),
            json!({ "response": response }),
        ),
        Err(res) => res,
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::UpdateItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    let item = match services.directory.update_item(body.into()).await {
        Ok(item) => item,
        Err(e) => return errors::service_error_to_response(e),
    };

    match dto::to_json(&item) {
        Ok(changes) => dto::success(
            StatusCode::OK,
            format!("Updated item #{}", item.public_id),
            json!({ "changes": changes }),
        ),
        Err(res) => res,
    }
}

pub async fn item_history(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::ItemHistoryRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    let history = match services.ledger.history(&body.id).await {
        Ok(h) => h,
        Err(e) => return errors::service_error_to_response(e),
    };

    match dto::to_json(&history) {
        Ok(response) => dto::success(
            StatusCode::OK,
            format!("Found {} movements", history.len()),
            json!({ "response": response }),
        ),
        Err(res) => res,
    }
}
