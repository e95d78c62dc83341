//! Service-level error model.

use thiserror::Error;

use stockroom_core::{AreaId, DomainError};

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One area that recursive deletion could not remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaDeletionFailure {
    pub area: AreaId,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),

    /// Recursive deletion finished with some areas left behind.
    #[error("area deletion incomplete: {} deleted, {} failed", deleted.len(), failures.len())]
    AreaDeletionIncomplete {
        deleted: Vec<AreaId>,
        failures: Vec<AreaDeletionFailure>,
    },
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(domain) => Self::Domain(domain),
            StoreError::DuplicateKey(field) => Self::Domain(DomainError::duplicate(field)),
            other => Self::Store(other),
        }
    }
}

impl ServiceError {
    /// Translate a storage `NotFound` into a domain error naming the reference.
    pub(crate) fn missing(err: StoreError, entity: &'static str, reference: impl ToString) -> Self {
        match err {
            StoreError::NotFound => DomainError::not_found(entity, reference).into(),
            other => other.into(),
        }
    }

    /// The domain error carried, if this is a client-facing failure.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(e) => Some(e),
            _ => None,
        }
    }
}
