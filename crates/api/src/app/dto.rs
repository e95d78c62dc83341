use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as JsonValue, json};

use stockroom_core::{AreaId, ItemId, Reference, TagId, TagRef, UserId};
use stockroom_infra::{
    AreaQuery, CreateItem, ItemQuery, MoveArea, NewArea, TagQuery, UpdateItem,
};
use stockroom_inventory::Direction;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub id: i64,
    pub name: String,
    pub quantity: Option<i64>,
    #[serde(default)]
    pub meta: Map<String, JsonValue>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    pub area: Reference<AreaId>,
}

impl From<CreateItemRequest> for CreateItem {
    fn from(req: CreateItemRequest) -> Self {
        CreateItem {
            public_id: req.id,
            name: req.name,
            quantity: req.quantity,
            meta: req.meta,
            tags: req.tags,
            area: req.area,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ItemQueryRequest {
    pub id: Option<Reference<ItemId>>,
    pub tags: Vec<TagRef>,
    pub area: Option<Reference<AreaId>>,
    pub name: Option<String>,
    pub orphaned: Option<bool>,
}

impl From<ItemQueryRequest> for ItemQuery {
    fn from(req: ItemQueryRequest) -> Self {
        ItemQuery {
            id: req.id,
            tags: req.tags,
            area: req.area,
            name: req.name,
            orphaned: req.orphaned,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub id: Reference<ItemId>,
    pub name: Option<String>,
    pub area: Option<Reference<AreaId>>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub meta: Map<String, JsonValue>,
    pub quantity: Option<i64>,
}

impl From<UpdateItemRequest> for UpdateItem {
    fn from(req: UpdateItemRequest) -> Self {
        UpdateItem {
            id: req.id,
            name: req.name,
            area: req.area,
            tags: req.tags,
            meta: req.meta,
            quantity: req.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemHistoryRequest {
    pub id: Reference<ItemId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TagQueryRequest {
    pub id: Option<TagId>,
    pub name: Option<String>,
}

impl From<TagQueryRequest> for TagQuery {
    fn from(req: TagQueryRequest) -> Self {
        TagQuery {
            id: req.id,
            name: req.name,
        }
    }
}

/// Either `id` or `name`; `id` wins when both are present.
#[derive(Debug, Deserialize)]
pub struct DeleteTagRequest {
    pub id: Option<TagId>,
    pub name: Option<String>,
}

impl DeleteTagRequest {
    pub fn into_ref(self) -> Option<TagRef> {
        match (self.id, self.name) {
            (Some(id), _) => Some(TagRef::Id(id)),
            (None, Some(name)) => Some(TagRef::Name(name)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAreaRequest {
    pub id: i64,
    pub name: String,
    pub parent: Option<Reference<AreaId>>,
}

impl From<CreateAreaRequest> for NewArea {
    fn from(req: CreateAreaRequest) -> Self {
        NewArea {
            name: req.name,
            public_id: req.id,
            parent: req.parent,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AreaQueryRequest {
    pub id: Option<Reference<AreaId>>,
    pub parent: Option<Reference<AreaId>>,
    pub top_level: bool,
    pub bottom_level: bool,
}

impl From<AreaQueryRequest> for AreaQuery {
    fn from(req: AreaQueryRequest) -> Self {
        AreaQuery {
            id: req.id,
            parent: req.parent,
            top_level: req.top_level,
            bottom_level: req.bottom_level,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MoveAreaRequest {
    pub id: Reference<AreaId>,
    pub name: Option<String>,
    /// Absent: keep the parent. `null`: make the area a root.
    #[serde(default, deserialize_with = "present")]
    pub parent: Option<Option<Reference<AreaId>>>,
}

impl From<MoveAreaRequest> for MoveArea {
    fn from(req: MoveAreaRequest) -> Self {
        MoveArea {
            area: req.id,
            name: req.name,
            parent: req.parent,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteAreaRequest {
    pub id: Reference<AreaId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    pub id: Reference<ItemId>,
    /// Validated by the ledger so a bad value reports as an invalid quantity.
    #[serde(default)]
    pub quantity: JsonValue,
    pub user_id: Reference<UserId>,
    pub checking: Direction,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// -------------------------
// Body extraction
// -------------------------

/// Required JSON body.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(v)| v)
        .map_err(errors::rejection_to_response)
}

/// Optional JSON body for queries; no body (no JSON content type) means
/// "match everything".
pub fn query_body<T: Default>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, axum::response::Response> {
    match payload {
        Ok(Json(v)) => Ok(v),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(e) => Err(errors::rejection_to_response(e)),
    }
}

// -------------------------
// Success envelope
// -------------------------

/// `{"status":"success","message":..,"code":..}` plus the fields of `extra`.
pub fn success(
    status: StatusCode,
    message: impl Into<String>,
    extra: JsonValue,
) -> axum::response::Response {
    let mut envelope = Map::new();
    envelope.insert("status".into(), json!("success"));
    envelope.insert("message".into(), json!(message.into()));
    envelope.insert("code".into(), json!(status.as_u16()));
    if let JsonValue::Object(fields) = extra {
        envelope.extend(fields);
    }
    (status, Json(JsonValue::Object(envelope))).into_response()
}

/// Serialize a domain record for an envelope field.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<JsonValue, axum::response::Response> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "response serialization failed");
        errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_request_distinguishes_null_from_absent_parent() {
        let keep: MoveAreaRequest = serde_json::from_value(json!({"id": 1, "name": "x"})).unwrap();
        assert_eq!(keep.parent, None);

        let root: MoveAreaRequest =
            serde_json::from_value(json!({"id": 1, "parent": null})).unwrap();
        assert_eq!(root.parent, Some(None));

        let under: MoveAreaRequest =
            serde_json::from_value(json!({"id": 1, "parent": 7})).unwrap();
        assert_eq!(under.parent, Some(Some(Reference::Public(7))));
    }

    #[test]
    fn area_query_uses_camel_case_flags() {
        let q: AreaQueryRequest =
            serde_json::from_value(json!({"topLevel": true, "parent": 3})).unwrap();
        assert!(q.top_level);
        assert!(!q.bottom_level);
        assert_eq!(q.parent, Some(Reference::Public(3)));
    }

    #[test]
    fn stock_request_rejects_unknown_direction() {
        let res: Result<UpdateStockRequest, _> = serde_json::from_value(
            json!({"id": 1, "quantity": 3, "user_id": 1, "checking": "sideways"}),
        );
        assert!(res.is_err());
    }

    #[test]
    fn delete_tag_prefers_id() {
        let id = TagId::new();
        let req = DeleteTagRequest {
            id: Some(id),
            name: Some("red".into()),
        };
        assert_eq!(req.into_ref(), Some(TagRef::Id(id)));
        assert_eq!(
            DeleteTagRequest { id: None, name: None }.into_ref(),
            None
        );
    }
}
