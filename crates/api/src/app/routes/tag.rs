use std::sync::Arc;

use axum::{Json, extract::Extension, extract::rejection::JsonRejection, http::StatusCode};
use serde_json::json;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn create_tag(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateTagRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    match services.directory.create_tag(body.name).await {
        Ok(tag) => dto::success(
            StatusCode::CREATED,
            format!("Created tag {}", tag.name),
            json!({ "created": tag.tag_id.to_string() }),
        ),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn find_tags(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::TagQueryRequest>, JsonRejection>,
) -> axum::response::Response {
    let query = match dto::query_body(payload) {
        Ok(q) => q,
        Err(res) => return res,
    };

    let tags = match services.directory.find_tags(query.into()).await {
        Ok(tags) => tags,
        Err(e) => return errors::service_error_to_response(e),
    };

    match dto::to_json(&tags) {
        Ok(response) => dto::success(
            StatusCode::OK,
            format!("Found {} tags", tags.len()),
            json!({ "response": response }),
        ),
        Err(res) => res,
    }
}

pub async fn delete_tag(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::DeleteTagRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };
    let Some(tag) = body.into_ref() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "either id or name is required");
    };

    match services.directory.delete_tag(&tag).await {
        Ok((tag, detached)) => dto::success(
            StatusCode::OK,
            format!("Deleted tag {}", tag.name),
            json!({ "detached": detached }),
        ),
        Err(e) => errors::service_error_to_response(e),
    }
}
