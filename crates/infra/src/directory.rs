//! CRUD over items, tags and areas.
//!
//! Structural area work is delegated to [`AreaTreeManager`]; everything here
//! resolves references, builds a filter or patch, and hands it to storage.

use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use tracing::{info, instrument};

use stockroom_core::{AreaId, DomainError, ItemId, Reference, TagId, TagRef};
use stockroom_inventory::{
    Area, AreaFilter, Item, ItemFilter, ItemPatch, NewItem, Tag, TagFilter,
};

use crate::area_tree::{AreaDeletion, AreaTreeManager, MoveArea, NewArea};
use crate::error::{ServiceError, ServiceResult};
use crate::resolution::Resolver;
use crate::store::SharedStore;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateItem {
    pub public_id: i64,
    pub name: String,
    /// Defaults to 1.
    pub quantity: Option<i64>,
    pub meta: Map<String, JsonValue>,
    pub tags: Vec<TagRef>,
    pub area: Reference<AreaId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub id: Option<Reference<ItemId>>,
    pub tags: Vec<TagRef>,
    pub area: Option<Reference<AreaId>>,
    pub name: Option<String>,
    pub orphaned: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItem {
    pub id: Reference<ItemId>,
    pub name: Option<String>,
    pub area: Option<Reference<AreaId>>,
    /// Added to the existing tag set.
    pub tags: Vec<TagRef>,
    /// Key paths to set inside `meta`.
    pub meta: Map<String, JsonValue>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaQuery {
    pub id: Option<Reference<AreaId>>,
    pub parent: Option<Reference<AreaId>>,
    pub top_level: bool,
    pub bottom_level: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagQuery {
    pub id: Option<TagId>,
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct Directory {
    store: SharedStore,
    resolver: Resolver,
    tree: AreaTreeManager,
}

impl Directory {
    pub fn new(store: SharedStore) -> Self {
        Self {
            resolver: Resolver::new(store.clone()),
            tree: AreaTreeManager::new(store.clone()),
            store,
        }
    }

    // ---- items ----

    #[instrument(skip(self, cmd), fields(public_id = cmd.public_id), err)]
    pub async fn create_item(&self, cmd: CreateItem) -> ServiceResult<Item> {
        let area = self.resolver.area(&cmd.area).await?;
        let tags = self.resolver.tags(&cmd.tags).await?;

        let item = Item::create(
            NewItem {
                public_id: cmd.public_id,
                name: cmd.name,
                quantity: cmd.quantity.unwrap_or(1),
                area: area.area_id,
                tags,
                meta: cmd.meta,
            },
            Utc::now(),
        )?;

        let item = self.store.insert_item(item).await?;
        info!(item_id = %item.item_id, area_id = %area.area_id, "item created");
        Ok(item)
    }

    /// Items matching every supplied criterion. A public code that matches no
    /// record yields an empty list rather than an error.
    pub async fn find_items(&self, query: ItemQuery) -> ServiceResult<Vec<Item>> {
        let mut filter = ItemFilter {
            tags_all: self.resolver.tags(&query.tags).await?,
            name: query.name,
            orphaned: query.orphaned,
            ..ItemFilter::default()
        };

        if let Some(reference) = &query.id {
            match self.resolver.try_item(reference).await? {
                Some(id) => filter.item = Some(id),
                None => return Ok(Vec::new()),
            }
        }
        if let Some(reference) = &query.area {
            match self.resolver.try_area(reference).await? {
                Some(id) => filter.area = Some(id),
                None => return Ok(Vec::new()),
            }
        }

        Ok(self.store.find_items(&filter).await?)
    }

    /// Apply a partial update. All fields are applied together or not at all.
    #[instrument(skip(self, cmd), fields(item = %cmd.id), err)]
    pub async fn update_item(&self, cmd: UpdateItem) -> ServiceResult<Item> {
        let id = self.resolver.item(&cmd.id).await?;
        let area = match &cmd.area {
            Some(reference) => Some(self.resolver.area(reference).await?.area_id),
            None => None,
        };

        let patch = ItemPatch {
            name: cmd.name,
            area,
            add_tags: self.resolver.tags(&cmd.tags).await?,
            meta: cmd.meta,
            quantity: cmd.quantity,
        };
        if patch.is_empty() {
            return Err(DomainError::validation("nothing to update").into());
        }

        self.store
            .update_item(id, &patch)
            .await
            .map_err(|e| ServiceError::missing(e, "item", &cmd.id))
    }

    // ---- tags ----

    #[instrument(skip(self), err)]
    pub async fn create_tag(&self, name: String) -> ServiceResult<Tag> {
        let tag = self.store.insert_tag(Tag::create(name)?).await?;
        info!(tag_id = %tag.tag_id, "tag created");
        Ok(tag)
    }

    pub async fn find_tags(&self, query: TagQuery) -> ServiceResult<Vec<Tag>> {
        let filter = TagFilter {
            tag: query.id,
            name: query.name,
        };
        Ok(self.store.find_tags(&filter).await?)
    }

    /// Detach a tag from every item, then delete it. Returns the tag and the
    /// number of items it was removed from.
    #[instrument(skip(self), fields(tag = %tag), err)]
    pub async fn delete_tag(&self, tag: &TagRef) -> ServiceResult<(Tag, u64)> {
        let tag = self.resolver.tag(tag).await?;
        let detached = self.store.detach_tag(tag.tag_id).await?;
        if !self.store.delete_tag(tag.tag_id).await? {
            return Err(DomainError::TagNotFound(tag.name).into());
        }
        info!(tag_id = %tag.tag_id, detached, "tag deleted");
        Ok((tag, detached))
    }

    // ---- areas ----

    pub async fn create_area(&self, new: NewArea) -> ServiceResult<Area> {
        self.tree.create(new).await
    }

    pub async fn find_areas(&self, query: AreaQuery) -> ServiceResult<Vec<Area>> {
        let mut filter = AreaFilter {
            top_level: query.top_level,
            bottom_level: query.bottom_level,
            ..AreaFilter::default()
        };

        if let Some(reference) = &query.id {
            match self.resolver.try_area(reference).await? {
                Some(id) => filter.area = Some(id),
                None => return Ok(Vec::new()),
            }
        }
        if let Some(reference) = &query.parent {
            match self.resolver.try_area(reference).await? {
                Some(id) => filter.parent = Some(id),
                None => return Ok(Vec::new()),
            }
        }

        Ok(self.store.find_areas(&filter).await?)
    }

    pub async fn delete_area(&self, reference: &Reference<AreaId>) -> ServiceResult<AreaDeletion> {
        self.tree.delete(reference).await
    }

    pub async fn move_area(&self, cmd: MoveArea) -> ServiceResult<Area> {
        self.tree.move_area(cmd).await
    }
}
