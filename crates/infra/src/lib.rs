//! Infrastructure layer: storage boundary plus the services that enforce the
//! stock and area-tree invariants on top of it.

pub mod area_tree;
pub mod directory;
pub mod error;
pub mod resolution;
pub mod stock_ledger;
pub mod store;

pub use area_tree::{AreaDeletion, AreaTreeManager, MoveArea, NewArea};
pub use directory::{AreaQuery, CreateItem, Directory, ItemQuery, TagQuery, UpdateItem};
pub use error::{AreaDeletionFailure, ServiceError, ServiceResult};
pub use resolution::Resolver;
pub use stock_ledger::StockLedger;
pub use store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, SharedStore, StoreError};
