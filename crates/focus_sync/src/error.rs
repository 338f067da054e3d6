use focus_core::ValidationError;
use thiserror::Error;

use crate::store::Collection;

pub type StoreResult<T> = Result<T, StoreError>;
pub type SyncResult<T> = Result<T, SyncError>;

/// Failures crossing the storage boundary. Every variant carries enough
/// context to log and to phrase a user-facing message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("not signed in")]
    AuthRequired,

    #[error("backend rejected the request: {reason}")]
    Rejected { reason: String },

    #[error("backend unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("malformed row in {collection}: {detail}")]
    Malformed {
        collection: Collection,
        detail: String,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::Unreachable {
            reason: reason.into(),
        }
    }

    pub fn malformed(collection: Collection, detail: impl Into<String>) -> Self {
        Self::Malformed {
            collection,
            detail: detail.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }
}

/// What a service operation can fail with: local validation, caught
/// before any network traffic, or a storage failure.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}
