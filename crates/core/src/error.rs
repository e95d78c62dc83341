//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Storage
/// failures are modelled separately in `stockroom-infra`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input or a constraint violation on a field.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced item, area or tag does not exist.
    #[error("{entity} not found: {reference}")]
    NotFound {
        entity: &'static str,
        reference: String,
    },

    /// A tag name could not be resolved to an identifier.
    #[error("Couldn't find tag {0}")]
    TagNotFound(String),

    /// A uniqueness constraint was violated (public code, tag name).
    #[error("duplicate key: {0} already exists")]
    DuplicateKey(String),

    /// A stock change would push `available` outside `[min, max]`.
    #[error("proposed value {proposed} not in range {min}-{max}")]
    RangeViolation { proposed: i64, min: i64, max: i64 },

    /// A movement quantity was not a positive integer.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Re-parenting would introduce a cycle in the area tree.
    #[error("moving area {area} under {parent} would create a cycle")]
    Cycle { area: String, parent: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, reference: impl ToString) -> Self {
        Self::NotFound {
            entity,
            reference: reference.to_string(),
        }
    }

    pub fn duplicate(field: impl Into<String>) -> Self {
        Self::DuplicateKey(field.into())
    }

    pub fn invalid_quantity(detail: impl Into<String>) -> Self {
        Self::InvalidQuantity(detail.into())
    }

    pub fn out_of_range(proposed: i64, max: i64) -> Self {
        Self::RangeViolation {
            proposed,
            min: 0,
            max,
        }
    }
}
