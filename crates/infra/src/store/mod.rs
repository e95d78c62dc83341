//! Document storage boundary.
//!
//! The services depend on storage only through a handful of primitives:
//! lookup-by-filter, insert, partial-update-by-filter and delete. Two of
//! them carry invariants that storage itself must enforce:
//!
//! - `apply_movement` is a single conditional update: the new `available`
//!   value is written (together with its history entry) only if it stays in
//!   `[0, quantity]`. There is no separate read step a concurrent request
//!   could interleave with.
//! - `add_child` has set semantics: concurrent inserts under the same parent
//!   never overwrite each other.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockroom_core::{AreaId, DomainError, ItemId, TagId};
use stockroom_inventory::{Area, AreaFilter, Item, ItemFilter, ItemPatch, StockMovement, Tag, TagFilter};

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

/// Storage operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// Unique constraint violated; carries the field name.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A domain rule rejected a conditional update.
    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Process-wide storage handle, constructed once at startup and injected.
pub type SharedStore = Arc<dyn InventoryStore>;

#[async_trait]
pub trait InventoryStore: Send + Sync {
    // ---- items ----

    async fn insert_item(&self, item: Item) -> Result<Item, StoreError>;

    /// Items matching `filter`, ordered by public code.
    async fn find_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError>;

    async fn item_id_by_public(&self, public_id: i64) -> Result<Option<ItemId>, StoreError>;

    /// Apply `patch` to one item atomically. `NotFound` if it does not exist.
    async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<Item, StoreError>;

    /// Conditional `available` update plus history append, as one step.
    async fn apply_movement(
        &self,
        id: ItemId,
        movement: &StockMovement,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError>;

    /// Clear `area` on every item in `area`; returns the number of items touched.
    async fn orphan_items_in_area(&self, area: AreaId) -> Result<u64, StoreError>;

    /// Remove `tag` from every item carrying it; returns the number of items touched.
    async fn detach_tag(&self, tag: TagId) -> Result<u64, StoreError>;

    // ---- areas ----

    async fn insert_area(&self, area: Area) -> Result<Area, StoreError>;

    /// Areas matching `filter`, ordered by public code.
    async fn find_areas(&self, filter: &AreaFilter) -> Result<Vec<Area>, StoreError>;

    async fn area_id_by_public(&self, public_id: i64) -> Result<Option<AreaId>, StoreError>;

    /// Set-add `child` to `parent.children`. Returns `false` if `parent` is missing.
    async fn add_child(&self, parent: AreaId, child: AreaId) -> Result<bool, StoreError>;

    /// Remove `child` from `parent.children`. Returns `false` if `parent` is missing.
    async fn remove_child(&self, parent: AreaId, child: AreaId) -> Result<bool, StoreError>;

    /// Rename and/or re-point the parent of one area.
    async fn update_area(
        &self,
        id: AreaId,
        name: Option<String>,
        parent: Option<Option<AreaId>>,
    ) -> Result<Area, StoreError>;

    /// Returns `false` if the area did not exist.
    async fn delete_area(&self, id: AreaId) -> Result<bool, StoreError>;

    // ---- tags ----

    async fn insert_tag(&self, tag: Tag) -> Result<Tag, StoreError>;

    /// Tags matching `filter`, ordered by name.
    async fn find_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>, StoreError>;

    async fn tag_id_by_name(&self, name: &str) -> Result<Option<TagId>, StoreError>;

    /// Returns `false` if the tag did not exist.
    async fn delete_tag(&self, id: TagId) -> Result<bool, StoreError>;

    /// Release held connections on shutdown. Stores without any keep the default.
    async fn close(&self) {}

    // ---- conveniences ----

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.find_items(&ItemFilter::by_id(id)).await?.into_iter().next())
    }

    async fn get_area(&self, id: AreaId) -> Result<Option<Area>, StoreError> {
        Ok(self.find_areas(&AreaFilter::by_id(id)).await?.into_iter().next())
    }
}
