use std::sync::Arc;

use axum::{Json, extract::Extension, extract::rejection::JsonRejection, http::StatusCode};
use serde_json::json;

use stockroom_inventory::Direction;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn update_stock(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::UpdateStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    let item = match services
        .ledger
        .apply(&body.id, &body.quantity, body.checking, body.user_id)
        .await
    {
        Ok(item) => item,
        Err(e) => return errors::service_error_to_response(e),
    };

    let verb = match body.checking {
        Direction::In => "Checked in",
        Direction::Out => "Checked out",
    };
    dto::success(
        StatusCode::OK,
        format!("{verb} {} of item #{}", body.quantity, item.public_id),
        json!({ "available": item.available, "quantity": item.quantity }),
    )
}
