//! Error types for quota registration and evaluation.
use crate::model::{MembershipTier, ResourceCategory};
use std::io;
use thiserror::Error;

/// Unified error type for every operation the quota core exposes.
///
/// There is no `LimitExceeded` variant: an exhausted quota is a normal
/// [`Decision`](crate::Decision), not a fault.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// Registration attempted for a user id that already exists.
    #[error("user '{user_id}' is registered already")]
    AlreadyRegistered { user_id: String },
    /// The user id is unknown to both the cache and durable storage.
    #[error("user not found: {user_id}")]
    UserNotFound { user_id: String },
    /// No policy configured for this tier/category combination.
    #[error("no quota policy configured for {tier} / {category}")]
    InvalidConfiguration { tier: MembershipTier, category: ResourceCategory },
    /// Input did not name a known resource category.
    #[error("invalid coffee type: {0:?}")]
    InvalidCategory(String),
    /// Input did not name a known membership tier.
    #[error("invalid membership type: {0:?}")]
    InvalidTier(String),
    /// User ids must be non-empty and usable as a record key.
    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),
    /// Durable storage I/O failed.
    #[error("storage error for '{user_id}': {source}")]
    Storage {
        user_id: String,
        #[source]
        source: io::Error,
    },
    /// A durable record exists but cannot be decoded.
    #[error("corrupt record for '{user_id}': {source}")]
    CorruptRecord {
        user_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl QuotaError {
    pub(crate) fn storage(user_id: &str, source: io::Error) -> Self {
        Self::Storage { user_id: user_id.to_string(), source }
    }

    pub(crate) fn corrupt(user_id: &str, source: serde_json::Error) -> Self {
        Self::CorruptRecord { user_id: user_id.to_string(), source }
    }

    /// True for failures of the durable layer (I/O or decoding).
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::CorruptRecord { .. })
    }

    /// True when the request itself was malformed.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidCategory(_) | Self::InvalidTier(_) | Self::InvalidUserId(_))
    }

    /// True for the unknown-user case.
    pub fn is_user_not_found(&self) -> bool {
        matches!(self, Self::UserNotFound { .. })
    }
}
