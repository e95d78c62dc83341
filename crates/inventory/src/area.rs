use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use stockroom_core::{AreaId, DomainError, DomainResult};

/// Storage area node in the area tree.
///
/// `children` is kept consistent with the children's `parent` pointers by the
/// area tree manager, not by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    #[serde(rename = "_id")]
    pub area_id: AreaId,
    #[serde(rename = "id")]
    pub public_id: i64,
    pub name: String,
    pub parent: Option<AreaId>,
    pub children: BTreeSet<AreaId>,
}

impl Area {
    /// New area with no children.
    pub fn create(name: String, public_id: i64, parent: Option<AreaId>) -> DomainResult<Self> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            area_id: AreaId::new(),
            public_id,
            name,
            parent,
            children: BTreeSet::new(),
        })
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_bottom_level(&self) -> bool {
        self.children.is_empty()
    }
}
