//! Inventory domain module.
//!
//! This crate contains business rules for items, areas and tags, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod area;
pub mod filter;
pub mod item;
pub mod meta;
pub mod stock;
pub mod tag;

pub use area::Area;
pub use filter::{AreaFilter, ItemFilter, TagFilter};
pub use item::{CheckoutEntry, Item, ItemPatch, NewItem};
pub use stock::{Direction, StockMovement, parse_quantity, rescale_available};
pub use tag::Tag;
