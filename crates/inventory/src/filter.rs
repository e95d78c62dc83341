//! Query criteria over items, areas and tags.
//!
//! Filters only carry resolved internal identifiers; public codes and tag
//! names are turned into identifiers before a filter is built. All fields
//! combine with AND; an empty filter matches everything.

use stockroom_core::{AreaId, ItemId, TagId};

use crate::{Area, Item, Tag};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub item: Option<ItemId>,
    /// Item must carry all of these tags.
    pub tags_all: Vec<TagId>,
    pub area: Option<AreaId>,
    pub orphaned: Option<bool>,
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
}

impl ItemFilter {
    pub fn by_id(item: ItemId) -> Self {
        Self {
            item: Some(item),
            ..Self::default()
        }
    }

    pub fn in_area(area: AreaId) -> Self {
        Self {
            area: Some(area),
            ..Self::default()
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        if self.item.is_some_and(|id| id != item.item_id) {
            return false;
        }
        if !self.tags_all.iter().all(|t| item.tags.contains(t)) {
            return false;
        }
        if self.area.is_some() && self.area != item.area {
            return false;
        }
        if self.orphaned.is_some_and(|o| o != item.is_orphaned()) {
            return false;
        }
        if let Some(needle) = &self.name {
            if !item.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaFilter {
    pub area: Option<AreaId>,
    pub parent: Option<AreaId>,
    /// Only areas without a parent.
    pub top_level: bool,
    /// Only areas without children.
    pub bottom_level: bool,
}

impl AreaFilter {
    pub fn by_id(area: AreaId) -> Self {
        Self {
            area: Some(area),
            ..Self::default()
        }
    }

    pub fn children_of(parent: AreaId) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn matches(&self, area: &Area) -> bool {
        if self.area.is_some_and(|id| id != area.area_id) {
            return false;
        }
        if self.parent.is_some() && self.parent != area.parent {
            return false;
        }
        if self.top_level && !area.is_top_level() {
            return false;
        }
        if self.bottom_level && !area.is_bottom_level() {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    pub tag: Option<TagId>,
    pub name: Option<String>,
}

impl TagFilter {
    pub fn matches(&self, tag: &Tag) -> bool {
        self.tag.is_none_or(|id| id == tag.tag_id)
            && self.name.as_deref().is_none_or(|n| n == tag.name)
    }
}
