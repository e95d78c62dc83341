use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use stockroom_core::{AreaId, DomainError, DomainResult, ItemId, Reference, TagId, UserId};

use crate::meta;
use crate::stock::{Direction, StockMovement, rescale_available};

/// One append-only checkout history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutEntry {
    #[serde(rename = "userID")]
    pub user: Reference<UserId>,
    pub time: DateTime<Utc>,
    pub checking: Direction,
    pub quantity: i64,
}

/// Inventory item document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "_id")]
    pub item_id: ItemId,
    #[serde(rename = "id")]
    pub public_id: i64,
    pub name: String,
    pub quantity: i64,
    pub available: i64,
    /// `None` once the containing area has been deleted (orphaned).
    pub area: Option<AreaId>,
    pub tags: BTreeSet<TagId>,
    pub meta: Map<String, JsonValue>,
    #[serde(rename = "checkoutHistory")]
    pub checkout_history: Vec<CheckoutEntry>,
    #[serde(rename = "dateAdded")]
    pub date_added: DateTime<Utc>,
}

/// Fields supplied when creating an item (identifiers already resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub public_id: i64,
    pub name: String,
    pub quantity: i64,
    pub area: AreaId,
    pub tags: Vec<TagId>,
    pub meta: Map<String, JsonValue>,
}

impl Item {
    /// Build a fresh item with every unit available.
    pub fn create(new: NewItem, now: DateTime<Utc>) -> DomainResult<Self> {
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if new.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(Self {
            item_id: ItemId::new(),
            public_id: new.public_id,
            name: new.name,
            quantity: new.quantity,
            available: new.quantity,
            area: Some(new.area),
            tags: new.tags.into_iter().collect(),
            meta: new.meta,
            checkout_history: Vec::new(),
            date_added: now,
        })
    }

    pub fn is_orphaned(&self) -> bool {
        self.area.is_none()
    }

    /// Apply a movement: validate, append history, update `available`.
    ///
    /// Either both the history entry and the counter change, or neither does.
    pub fn apply_movement(&mut self, movement: &StockMovement, at: DateTime<Utc>) -> DomainResult<i64> {
        let projected = movement.project(self.available, self.quantity)?;
        self.checkout_history.push(movement.entry(at));
        self.available = projected;
        Ok(projected)
    }

    /// Change the total quantity, keeping the checked-out count.
    pub fn set_quantity(&mut self, new_quantity: i64) -> DomainResult<()> {
        self.available = rescale_available(self.quantity, self.available, new_quantity)?;
        self.quantity = new_quantity;
        Ok(())
    }

    pub fn rename(&mut self, name: String) -> DomainResult<()> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        self.name = name;
        Ok(())
    }

    /// Set-union of `tags` into the item's tags.
    pub fn add_tags(&mut self, tags: impl IntoIterator<Item = TagId>) {
        self.tags.extend(tags);
    }
}

/// Partial update applied to one item as a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub area: Option<AreaId>,
    /// Unioned into the existing tag set.
    pub add_tags: Vec<TagId>,
    /// Dot-separated key paths to set inside `meta`.
    pub meta: Map<String, JsonValue>,
    pub quantity: Option<i64>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.area.is_none()
            && self.add_tags.is_empty()
            && self.meta.is_empty()
            && self.quantity.is_none()
    }

    /// Apply every field or none of them.
    pub fn apply(&self, item: &mut Item) -> DomainResult<()> {
        let mut next = item.clone();
        if let Some(name) = &self.name {
            next.rename(name.clone())?;
        }
        if let Some(area) = self.area {
            next.area = Some(area);
        }
        next.add_tags(self.add_tags.iter().copied());
        meta::apply_updates(&mut next.meta, &self.meta)?;
        if let Some(quantity) = self.quantity {
            next.set_quantity(quantity)?;
        }
        *item = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(quantity: i64) -> Item {
        Item::create(
            NewItem {
                public_id: 1,
                name: "Widget".to_string(),
                quantity,
                area: AreaId::new(),
                tags: vec![],
                meta: Map::new(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn movement(quantity: i64, direction: Direction) -> StockMovement {
        StockMovement::new(quantity, direction, Reference::Public(1)).unwrap()
    }

    #[test]
    fn new_item_is_fully_available() {
        let item = widget(10);
        assert_eq!(item.available, 10);
        assert!(item.checkout_history.is_empty());
        assert!(!item.is_orphaned());
    }

    #[test]
    fn out_then_in_restores_available_and_records_two_entries() {
        let mut item = widget(10);
        item.apply_movement(&movement(4, Direction::Out), Utc::now()).unwrap();
        assert_eq!(item.available, 6);
        item.apply_movement(&movement(4, Direction::In), Utc::now()).unwrap();
        assert_eq!(item.available, 10);
        assert_eq!(item.checkout_history.len(), 2);
        assert_eq!(item.checkout_history[0].checking, Direction::Out);
        assert_eq!(item.checkout_history[1].checking, Direction::In);
    }

    #[test]
    fn rejected_movement_leaves_item_untouched() {
        let mut item = widget(10);
        item.apply_movement(&movement(3, Direction::Out), Utc::now()).unwrap();
        let before = item.clone();
        let err = item
            .apply_movement(&movement(8, Direction::Out), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::RangeViolation { proposed: -1, min: 0, max: 10 }));
        assert_eq!(item, before);
    }

    #[test]
    fn tags_have_set_semantics() {
        let mut item = widget(1);
        let t = TagId::new();
        item.add_tags([t, t]);
        item.add_tags([t]);
        assert_eq!(item.tags.len(), 1);
    }

    #[test]
    fn patch_is_all_or_nothing() {
        let mut item = widget(10);
        item.apply_movement(&movement(6, Direction::Out), Utc::now()).unwrap();
        let before = item.clone();
        let patch = ItemPatch {
            name: Some("Gadget".to_string()),
            quantity: Some(4),
            ..Default::default()
        };
        assert!(matches!(
            patch.apply(&mut item),
            Err(DomainError::RangeViolation { .. })
        ));
        assert_eq!(item, before);
    }

    #[test]
    fn patch_quantity_keeps_checked_out_units() {
        let mut item = widget(10);
        item.apply_movement(&movement(2, Direction::Out), Utc::now()).unwrap();
        let patch = ItemPatch {
            quantity: Some(20),
            ..Default::default()
        };
        patch.apply(&mut item).unwrap();
        assert_eq!((item.quantity, item.available), (20, 18));
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Item::create(
            NewItem {
                public_id: 2,
                name: "  ".to_string(),
                quantity: 1,
                area: AreaId::new(),
                tags: vec![],
                meta: Map::new(),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn serializes_with_document_field_names() {
        let item = widget(2);
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["_id"], item.item_id.to_string());
        assert_eq!(v["id"], 1);
        assert!(v["checkoutHistory"].is_array());
        assert!(v.get("dateAdded").is_some());
    }
}
