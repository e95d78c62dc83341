use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_core::{AreaId, ItemId, TagId};
use stockroom_inventory::{Area, AreaFilter, Item, ItemFilter, ItemPatch, StockMovement, Tag, TagFilter};

use super::{InventoryStore, StoreError};

#[derive(Debug, Default)]
struct Collections {
    items: HashMap<ItemId, Item>,
    areas: HashMap<AreaId, Area>,
    tags: HashMap<TagId, Tag>,
}

/// In-memory document store.
///
/// Intended for tests/dev. Every primitive runs inside a single lock
/// critical section, which is what makes conditional updates atomic here.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    inner: RwLock<Collections>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Collections>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Collections>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert_item(&self, item: Item) -> Result<Item, StoreError> {
        let mut db = self.write()?;
        if db.items.values().any(|i| i.public_id == item.public_id) {
            return Err(StoreError::DuplicateKey("id".to_string()));
        }
        if db.items.contains_key(&item.item_id) {
            return Err(StoreError::DuplicateKey("_id".to_string()));
        }
        db.items.insert(item.item_id, item.clone());
        Ok(item)
    }

    async fn find_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let db = self.read()?;
        let mut found: Vec<Item> = match filter.item {
            Some(id) => db.items.get(&id).filter(|i| filter.matches(i)).cloned().into_iter().collect(),
            None => db.items.values().filter(|i| filter.matches(i)).cloned().collect(),
        };
        found.sort_by_key(|i| i.public_id);
        Ok(found)
    }

    async fn item_id_by_public(&self, public_id: i64) -> Result<Option<ItemId>, StoreError> {
        let db = self.read()?;
        Ok(db
            .items
            .values()
            .find(|i| i.public_id == public_id)
            .map(|i| i.item_id))
    }

    async fn update_item(&self, id: ItemId, patch: &ItemPatch) -> Result<Item, StoreError> {
        let mut db = self.write()?;
        let item = db.items.get_mut(&id).ok_or(StoreError::NotFound)?;
        patch.apply(item)?;
        Ok(item.clone())
    }

    async fn apply_movement(
        &self,
        id: ItemId,
        movement: &StockMovement,
        at: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut db = self.write()?;
        let item = db.items.get_mut(&id).ok_or(StoreError::NotFound)?;
        item.apply_movement(movement, at)?;
        Ok(item.clone())
    }

    async fn orphan_items_in_area(&self, area: AreaId) -> Result<u64, StoreError> {
        let mut db = self.write()?;
        let mut touched = 0;
        for item in db.items.values_mut().filter(|i| i.area == Some(area)) {
            item.area = None;
            touched += 1;
        }
        Ok(touched)
    }

    async fn detach_tag(&self, tag: TagId) -> Result<u64, StoreError> {
        let mut db = self.write()?;
        let mut touched = 0;
        for item in db.items.values_mut() {
            if item.tags.remove(&tag) {
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn insert_area(&self, area: Area) -> Result<Area, StoreError> {
        let mut db = self.write()?;
        if db.areas.values().any(|a| a.public_id == area.public_id) {
            return Err(StoreError::DuplicateKey("id".to_string()));
        }
        if db.areas.contains_key(&area.area_id) {
            return Err(StoreError::DuplicateKey("_id".to_string()));
        }
        db.areas.insert(area.area_id, area.clone());
        Ok(area)
    }

    async fn find_areas(&self, filter: &AreaFilter) -> Result<Vec<Area>, StoreError> {
        let db = self.read()?;
        let mut found: Vec<Area> = db.areas.values().filter(|a| filter.matches(a)).cloned().collect();
        found.sort_by_key(|a| a.public_id);
        Ok(found)
    }

    async fn area_id_by_public(&self, public_id: i64) -> Result<Option<AreaId>, StoreError> {
        let db = self.read()?;
        Ok(db
            .areas
            .values()
            .find(|a| a.public_id == public_id)
            .map(|a| a.area_id))
    }

    async fn add_child(&self, parent: AreaId, child: AreaId) -> Result<bool, StoreError> {
        let mut db = self.write()?;
        match db.areas.get_mut(&parent) {
            Some(area) => {
                area.children.insert(child);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_child(&self, parent: AreaId, child: AreaId) -> Result<bool, StoreError> {
        let mut db = self.write()?;
        match db.areas.get_mut(&parent) {
            Some(area) => {
                area.children.remove(&child);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_area(
        &self,
        id: AreaId,
        name: Option<String>,
        parent: Option<Option<AreaId>>,
    ) -> Result<Area, StoreError> {
        let mut db = self.write()?;
        let area = db.areas.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(name) = name {
            area.name = name;
        }
        if let Some(parent) = parent {
            area.parent = parent;
        }
        Ok(area.clone())
    }

    async fn delete_area(&self, id: AreaId) -> Result<bool, StoreError> {
        let mut db = self.write()?;
        Ok(db.areas.remove(&id).is_some())
    }

    async fn insert_tag(&self, tag: Tag) -> Result<Tag, StoreError> {
        let mut db = self.write()?;
        if db.tags.values().any(|t| t.name == tag.name) {
            return Err(StoreError::DuplicateKey("name".to_string()));
        }
        db.tags.insert(tag.tag_id, tag.clone());
        Ok(tag)
    }

    async fn find_tags(&self, filter: &TagFilter) -> Result<Vec<Tag>, StoreError> {
        let db = self.read()?;
        let mut found: Vec<Tag> = db.tags.values().filter(|t| filter.matches(t)).cloned().collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn tag_id_by_name(&self, name: &str) -> Result<Option<TagId>, StoreError> {
        let db = self.read()?;
        Ok(db.tags.values().find(|t| t.name == name).map(|t| t.tag_id))
    }

    async fn delete_tag(&self, id: TagId) -> Result<bool, StoreError> {
        let mut db = self.write()?;
        Ok(db.tags.remove(&id).is_some())
    }
}
