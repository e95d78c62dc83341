//! `stockroom-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, user-supplied references and the error taxonomy shared by
//! every other crate.

pub mod error;
pub mod id;
pub mod reference;

pub use error::{DomainError, DomainResult};
pub use id::{AreaId, ItemId, TagId, UserId};
pub use reference::{Reference, TagRef};
