use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, TagId};

/// Tag document: a unique name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "_id")]
    pub tag_id: TagId,
    pub name: String,
}

impl Tag {
    pub fn create(name: String) -> DomainResult<Self> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("tag name cannot be empty"));
        }
        // A name that parses as an identifier could never be resolved by name.
        if TagId::is_valid(&name) {
            return Err(DomainError::validation(
                "tag name cannot be an identifier",
            ));
        }
        Ok(Self {
            tag_id: TagId::new(),
            name,
        })
    }
}
