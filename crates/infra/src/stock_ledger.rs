//! Check-in / check-out against an item's `available` counter.

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use stockroom_core::{DomainError, ItemId, Reference, UserId};
use stockroom_inventory::{CheckoutEntry, Direction, Item, StockMovement, parse_quantity};

use crate::error::{ServiceError, ServiceResult};
use crate::resolution::Resolver;
use crate::store::SharedStore;

#[derive(Clone)]
pub struct StockLedger {
    store: SharedStore,
    resolver: Resolver,
}

impl StockLedger {
    pub fn new(store: SharedStore) -> Self {
        let resolver = Resolver::new(store.clone());
        Self { store, resolver }
    }

    /// Apply one movement and return the updated item.
    ///
    /// The bounds check and the write happen in a single storage step, so two
    /// concurrent movements on one item can never both pass against a stale
    /// `available` value.
    #[instrument(skip(self, quantity), fields(item = %item, direction = %direction), err)]
    pub async fn apply(
        &self,
        item: &Reference<ItemId>,
        quantity: &JsonValue,
        direction: Direction,
        user: Reference<UserId>,
    ) -> ServiceResult<Item> {
        let id = self.resolver.item(item).await?;
        let quantity = parse_quantity(quantity)?;
        let movement = StockMovement::new(quantity, direction, user)?;

        let updated = self
            .store
            .apply_movement(id, &movement, Utc::now())
            .await
            .map_err(|e| ServiceError::missing(e, "item", item))?;

        info!(
            item_id = %updated.item_id,
            direction = %direction,
            quantity,
            available = updated.available,
            "stock updated"
        );
        Ok(updated)
    }

    /// Movement history of one item, in application order.
    pub async fn history(&self, item: &Reference<ItemId>) -> ServiceResult<Vec<CheckoutEntry>> {
        let id = self.resolver.item(item).await?;
        self.store
            .get_item(id)
            .await?
            .map(|i| i.checkout_history)
            .ok_or_else(|| DomainError::not_found("item", item).into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Map, json};

    use stockroom_core::AreaId;
    use stockroom_inventory::NewItem;

    use super::*;
    use crate::store::{InMemoryInventoryStore, InventoryStore};

    async fn ledger_with_item(quantity: i64) -> (StockLedger, Reference<ItemId>) {
        let store: SharedStore = Arc::new(InMemoryInventoryStore::new());
        let item = Item::create(
            NewItem {
                public_id: 1,
                name: "Drill".into(),
                quantity,
                area: AreaId::new(),
                tags: vec![],
                meta: Map::new(),
            },
            Utc::now(),
        )
        .unwrap();
        store.insert_item(item).await.unwrap();
        (StockLedger::new(store), Reference::Public(1))
    }

    #[tokio::test]
    async fn checkout_then_rejected_overdraw_leaves_available_unchanged() {
        let (ledger, item) = ledger_with_item(10).await;

        let updated = ledger
            .apply(&item, &json!(3), Direction::Out, Reference::Public(1))
            .await
            .unwrap();
        assert_eq!(updated.available, 7);
        assert_eq!(updated.checkout_history.len(), 1);

        let err = ledger
            .apply(&item, &json!(8), Direction::Out, Reference::Public(1))
            .await
            .unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&DomainError::RangeViolation { proposed: -1, min: 0, max: 10 })
        );
        assert_eq!(err.to_string(), "proposed value -1 not in range 0-10");

        let history = ledger.history(&item).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn checkout_and_checkin_restore_available() {
        let (ledger, item) = ledger_with_item(5).await;
        let user = Reference::Public(9);

        ledger.apply(&item, &json!(2), Direction::Out, user).await.unwrap();
        let updated = ledger.apply(&item, &json!(2), Direction::In, user).await.unwrap();

        assert_eq!(updated.available, 5);
        let directions: Vec<_> = updated.checkout_history.iter().map(|e| e.checking).collect();
        assert_eq!(directions, vec![Direction::Out, Direction::In]);
    }

    #[tokio::test]
    async fn non_positive_or_fractional_quantities_are_invalid() {
        let (ledger, item) = ledger_with_item(5).await;

        for raw in [json!(0), json!(-2), json!(1.5), json!("3")] {
            let err = ledger
                .apply(&item, &raw, Direction::In, Reference::Public(1))
                .await
                .unwrap_err();
            assert!(
                matches!(err.as_domain(), Some(DomainError::InvalidQuantity(_))),
                "{raw} should be rejected, got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn overflowing_check_in_is_invalid_and_changes_nothing() {
        let (ledger, item) = ledger_with_item(10).await;

        let err = ledger
            .apply(&item, &json!(i64::MAX), Direction::In, Reference::Public(1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::InvalidQuantity(_))));
        assert!(ledger.history(&item).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let (ledger, _) = ledger_with_item(5).await;

        let err = ledger
            .apply(&Reference::Public(404), &json!(1), Direction::Out, Reference::Public(1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound { .. })));

        let err = ledger
            .apply(
                &Reference::Internal(ItemId::new()),
                &json!(1),
                Direction::Out,
                Reference::Public(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::NotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_movements_never_leave_bounds() {
        let (ledger, item) = ledger_with_item(3).await;

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let ledger = ledger.clone();
                let direction = if i % 2 == 0 { Direction::Out } else { Direction::In };
                tokio::spawn(async move {
                    ledger
                        .apply(&item, &json!(2), direction, Reference::Public(i))
                        .await
                })
            })
            .collect();

        let mut accepted = 0i64;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(updated) => {
                    assert!((0..=3).contains(&updated.available));
                    accepted += 1;
                }
                Err(err) => assert!(matches!(
                    err.as_domain(),
                    Some(DomainError::RangeViolation { .. })
                )),
            }
        }

        let history = ledger.history(&item).await.unwrap();
        assert_eq!(history.len() as i64, accepted);

        // Replaying the history from the initial value lands on the stored counter.
        let replayed = history.iter().fold(3, |acc, e| acc + e.checking.signed(e.quantity));
        let id = ledger.resolver.item(&item).await.unwrap();
        let final_item = ledger.store.get_item(id).await.unwrap().unwrap();
        assert_eq!(replayed, final_item.available);
        assert!((0..=3).contains(&final_item.available));
    }
}
