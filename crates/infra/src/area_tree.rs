//! Area tree manager.
//!
//! Owns the structural invariants of the area graph: a child listed under a
//! parent points back at that parent, and the graph stays acyclic.
//!
//! Recursive deletion walks the subtree with an explicit stack, one area at a
//! time, awaiting every storage step. It is best-effort rather than
//! transactional: if a step fails for some area, that area and its subtree are
//! left in place, the walk continues with the remaining areas, and every
//! failure is reported together in `ServiceError::AreaDeletionIncomplete`.
//! An area is unlinked from its parent only after its record is gone, and a
//! survivor whose parent was deleted is promoted to top level, so every
//! remaining area stays linked both ways. Items that were orphaned before a
//! failure stay orphaned.
//!
//! A delete racing with a create under the same subtree is not guarded: the
//! new child can be inserted under a parent that is deleted a moment later.

use std::collections::HashSet;

use tracing::{info, instrument, warn};

use stockroom_core::{AreaId, DomainError, Reference};
use stockroom_inventory::Area;

use crate::error::{AreaDeletionFailure, ServiceError, ServiceResult};
use crate::resolution::Resolver;
use crate::store::{SharedStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArea {
    pub name: String,
    pub public_id: i64,
    pub parent: Option<Reference<AreaId>>,
}

/// Rename and/or re-parent an area.
///
/// `parent: Some(None)` makes the area a root; `None` leaves it where it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveArea {
    pub area: Reference<AreaId>,
    pub name: Option<String>,
    pub parent: Option<Option<Reference<AreaId>>>,
}

/// Outcome of a completed recursive delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaDeletion {
    /// Deleted areas in visiting order (pre-order, root first).
    pub deleted: Vec<AreaId>,
    pub orphaned_items: u64,
}

#[derive(Clone)]
pub struct AreaTreeManager {
    store: SharedStore,
    resolver: Resolver,
}

impl AreaTreeManager {
    pub fn new(store: SharedStore) -> Self {
        let resolver = Resolver::new(store.clone());
        Self { store, resolver }
    }

    /// Create an area and link it under its parent.
    #[instrument(skip(self, new), fields(public_id = new.public_id), err)]
    pub async fn create(&self, new: NewArea) -> ServiceResult<Area> {
        let parent = match &new.parent {
            Some(reference) => Some(self.resolver.area(reference).await?.area_id),
            None => None,
        };

        let area = Area::create(new.name, new.public_id, parent)?;
        let area = self.store.insert_area(area).await?;

        if let Some(parent) = parent {
            if !self.store.add_child(parent, area.area_id).await? {
                // Parent vanished between resolution and linking.
                warn!(parent = %parent, area_id = %area.area_id, "parent deleted during create; rolling back");
                self.store.delete_area(area.area_id).await?;
                return Err(DomainError::not_found("area", parent).into());
            }
        }

        info!(area_id = %area.area_id, parent = ?area.parent, "area created");
        Ok(area)
    }

    /// Delete an area and every descendant, orphaning their items.
    #[instrument(skip(self), fields(area = %reference), err)]
    pub async fn delete(&self, reference: &Reference<AreaId>) -> ServiceResult<AreaDeletion> {
        let root = self.resolver.area(reference).await?;

        let mut stack = vec![root];
        let mut visited: HashSet<AreaId> = HashSet::new();
        let mut removed: HashSet<AreaId> = HashSet::new();
        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        let mut orphaned_items = 0;

        while let Some(area) = stack.pop() {
            if !visited.insert(area.area_id) {
                warn!(area_id = %area.area_id, "area reached twice; tree contains a cycle");
                continue;
            }
            let parent_removed = area.parent.is_some_and(|p| removed.contains(&p));

            match self.remove_one(&area).await {
                Ok(orphaned) => {
                    orphaned_items += orphaned;
                    removed.insert(area.area_id);
                    deleted.push(area.area_id);
                }
                Err(e) => {
                    warn!(area_id = %area.area_id, error = %e, "area deletion failed; skipping subtree");
                    failures.push(AreaDeletionFailure {
                        area: area.area_id,
                        error: e.to_string(),
                    });
                    if parent_removed {
                        self.reroot(area.area_id, &mut failures).await;
                    }
                    continue;
                }
            }

            // A parent inside the subtree is gone already.
            if let Some(parent) = area.parent.filter(|_| !parent_removed) {
                if let Err(e) = self.store.remove_child(parent, area.area_id).await {
                    warn!(parent = %parent, area_id = %area.area_id, error = %e, "failed to unlink deleted area");
                    failures.push(AreaDeletionFailure {
                        area: area.area_id,
                        error: format!("deleted but still listed under {parent}: {e}"),
                    });
                }
            }

            // Reverse so the first child is processed first.
            for child in area.children.iter().rev() {
                if visited.contains(child) {
                    continue;
                }
                match self.store.get_area(*child).await {
                    Ok(Some(child_area)) => stack.push(child_area),
                    Ok(None) => {
                        warn!(parent = %area.area_id, child = %child, "skipping dangling child reference");
                    }
                    Err(e) => {
                        failures.push(AreaDeletionFailure {
                            area: *child,
                            error: e.to_string(),
                        });
                        self.reroot(*child, &mut failures).await;
                    }
                }
            }
        }

        info!(
            deleted = deleted.len(),
            failed = failures.len(),
            orphaned_items,
            "area subtree deleted"
        );

        if failures.is_empty() {
            Ok(AreaDeletion {
                deleted,
                orphaned_items,
            })
        } else {
            Err(ServiceError::AreaDeletionIncomplete { deleted, failures })
        }
    }

    async fn remove_one(&self, area: &Area) -> ServiceResult<u64> {
        let orphaned = self.store.orphan_items_in_area(area.area_id).await?;
        self.store.delete_area(area.area_id).await?;
        Ok(orphaned)
    }

    /// Make a surviving area top-level once its parent has been deleted.
    async fn reroot(&self, area: AreaId, failures: &mut Vec<AreaDeletionFailure>) {
        match self.store.update_area(area, None, Some(None)).await {
            Ok(_) => info!(area_id = %area, "surviving area promoted to top level"),
            Err(StoreError::NotFound) => {}
            Err(e) => {
                warn!(area_id = %area, error = %e, "failed to re-root surviving area");
                failures.push(AreaDeletionFailure {
                    area,
                    error: format!("left under a deleted parent: {e}"),
                });
            }
        }
    }

    /// Rename and/or re-parent an area, refusing moves that would form a cycle.
    #[instrument(skip(self, cmd), fields(area = %cmd.area), err)]
    pub async fn move_area(&self, cmd: MoveArea) -> ServiceResult<Area> {
        if cmd.name.is_none() && cmd.parent.is_none() {
            return Err(DomainError::validation("nothing to update").into());
        }
        if cmd.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("name cannot be empty").into());
        }

        let area = self.resolver.area(&cmd.area).await?;

        let new_parent = match &cmd.parent {
            None => None,
            Some(None) => Some(None),
            Some(Some(reference)) => {
                let parent = self.resolver.area(reference).await?;
                self.ensure_acyclic(&area, &parent).await?;
                Some(Some(parent.area_id))
            }
        };

        let Some(target) = new_parent.filter(|p| *p != area.parent) else {
            return self
                .store
                .update_area(area.area_id, cmd.name, None)
                .await
                .map_err(|e| ServiceError::missing(e, "area", area.area_id));
        };

        // Link under the new parent first so the area is never unreachable.
        if let Some(parent) = target {
            if !self.store.add_child(parent, area.area_id).await? {
                return Err(DomainError::not_found("area", parent).into());
            }
        }

        let updated = match self
            .store
            .update_area(area.area_id, cmd.name, Some(target))
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                if let Some(parent) = target {
                    if let Err(undo) = self.store.remove_child(parent, area.area_id).await {
                        warn!(parent = %parent, area_id = %area.area_id, error = %undo, "failed to undo link after move failed");
                    }
                }
                return Err(ServiceError::missing(e, "area", area.area_id));
            }
        };

        if let Some(old) = area.parent {
            self.store.remove_child(old, area.area_id).await?;
        }

        info!(area_id = %area.area_id, from = ?area.parent, to = ?target, "area moved");
        Ok(updated)
    }

    /// Walk up from `parent`; reaching `area` means the move closes a loop.
    async fn ensure_acyclic(&self, area: &Area, parent: &Area) -> ServiceResult<()> {
        let mut seen = HashSet::new();
        let mut cursor = Some(parent.clone());
        while let Some(current) = cursor {
            if current.area_id == area.area_id {
                return Err(DomainError::Cycle {
                    area: area.public_id.to_string(),
                    parent: parent.public_id.to_string(),
                }
                .into());
            }
            if !seen.insert(current.area_id) {
                break;
            }
            cursor = match current.parent {
                Some(p) => self.store.get_area(p).await?,
                None => None,
            };
        }
        Ok(())
    }
}
