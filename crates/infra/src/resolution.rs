//! Turning user-supplied references into internal identifiers.
//!
//! Mutations use the strict forms, which fail with `NotFound` when a public
//! code matches nothing. Queries use the `try_` forms: a public code that
//! matches nothing yields `None`, and the caller answers with an empty list.

use stockroom_core::{AreaId, DomainError, ItemId, Reference, TagId, TagRef};
use stockroom_inventory::{Area, Tag, TagFilter};

use crate::error::{ServiceError, ServiceResult};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct Resolver {
    store: SharedStore,
}

impl Resolver {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn try_item(&self, reference: &Reference<ItemId>) -> ServiceResult<Option<ItemId>> {
        match reference {
            Reference::Internal(id) => Ok(Some(*id)),
            Reference::Public(code) => Ok(self.store.item_id_by_public(*code).await?),
        }
    }

    /// Resolve an item reference. Internal ids are passed through unchecked;
    /// the storage operation that consumes them reports a missing record.
    pub async fn item(&self, reference: &Reference<ItemId>) -> ServiceResult<ItemId> {
        self.try_item(reference)
            .await?
            .ok_or_else(|| DomainError::not_found("item", reference).into())
    }

    pub async fn try_area(&self, reference: &Reference<AreaId>) -> ServiceResult<Option<AreaId>> {
        match reference {
            Reference::Internal(id) => Ok(Some(*id)),
            Reference::Public(code) => Ok(self.store.area_id_by_public(*code).await?),
        }
    }

    /// Resolve an area reference to an existing record.
    pub async fn area(&self, reference: &Reference<AreaId>) -> ServiceResult<Area> {
        let missing = || ServiceError::from(DomainError::not_found("area", reference));
        let id = self.try_area(reference).await?.ok_or_else(missing)?;
        self.store.get_area(id).await?.ok_or_else(missing)
    }

    /// Resolve a tag list in order, failing on the first unknown name.
    ///
    /// Identifiers are kept as given; only names are looked up.
    pub async fn tags(&self, tags: &[TagRef]) -> ServiceResult<Vec<TagId>> {
        let mut resolved = Vec::with_capacity(tags.len());
        for tag in tags {
            let id = match tag {
                TagRef::Id(id) => *id,
                TagRef::Name(name) => self
                    .store
                    .tag_id_by_name(name)
                    .await?
                    .ok_or_else(|| DomainError::TagNotFound(name.clone()))?,
            };
            resolved.push(id);
        }
        Ok(resolved)
    }

    /// Resolve one tag reference to an existing record.
    pub async fn tag(&self, tag: &TagRef) -> ServiceResult<Tag> {
        let filter = match tag {
            TagRef::Id(id) => TagFilter {
                tag: Some(*id),
                ..TagFilter::default()
            },
            TagRef::Name(name) => TagFilter {
                name: Some(name.clone()),
                ..TagFilter::default()
            },
        };
        self.store
            .find_tags(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::TagNotFound(tag.to_string()).into())
    }
}
