//! Secret store interface.
//!
//! The store owns every credential version and the label set attached to
//! them. All mutation of labels goes through the rotation machine; the
//! propagation path only ever reads. Durable storage itself is external —
//! this crate ships only the trait and an in-memory provider for tests and
//! single-process deployments.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::core::{CredentialId, RotationToken, ValueSet};
use crate::retry::Retryable;

pub use memory::InMemorySecretStore;

/// Label attached to a credential version.
///
/// At most one version per credential carries each label. `Current` is
/// unique and always present once rotation has completed at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionLabel {
    /// The active version consumers should use.
    Current,
    /// A staged candidate owned by an in-flight rotation.
    Pending,
    /// The just-superseded version, kept alive for the grace window.
    Previous,
}

impl fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "current"),
            Self::Pending => write!(f, "pending"),
            Self::Previous => write!(f, "previous"),
        }
    }
}

/// Unique identifier of one credential version inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VersionId(Uuid);

impl VersionId {
    /// Generates a new version id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for VersionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// One stored credential version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretVersion {
    /// Store-assigned version id.
    pub version_id: VersionId,

    /// The secret material of this version.
    pub values: ValueSet,

    /// Rotation token that staged this version. Set while `pending`; kept
    /// afterwards for audit.
    pub owner: Option<RotationToken>,

    /// When the version was stored.
    pub created_at: DateTime<Utc>,
}

/// Result of an atomic promote: the new `current` and the version demoted to
/// `previous` (absent on the very first rotation).
#[derive(Debug, Clone)]
pub struct Promotion {
    /// The version now labeled `current`.
    pub current: SecretVersion,

    /// The version now labeled `previous`, if one existed.
    pub previous: Option<SecretVersion>,
}

/// Errors surfaced by secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The credential id is unknown to the store.
    #[error("credential not found: {id}")]
    NotFound {
        /// The unknown credential id.
        id: CredentialId,
    },

    /// The operation needs a version under a label that is not present.
    #[error("credential {id} has no {label} version")]
    MissingLabel {
        /// The credential id.
        id: CredentialId,
        /// The absent label.
        label: VersionLabel,
    },

    /// A pending version staged by a different rotation token exists.
    #[error("pending version for credential {id} is owned by another rotation")]
    PendingInFlight {
        /// The contested credential id.
        id: CredentialId,
    },

    /// The store refused the operation.
    #[error("store rejected {operation} for credential {id}: {reason}")]
    Rejected {
        /// The credential id.
        id: CredentialId,
        /// The refused operation.
        operation: &'static str,
        /// Store-supplied refusal reason.
        reason: String,
    },

    /// The store or the network failed transiently.
    #[error("transient store error: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// The store throttled the request.
    #[error("store throttled the request: {message}")]
    Throttled {
        /// Description of the throttle.
        message: String,
    },
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Throttled { .. })
    }
}

/// The credential store consumed by the rotation machine and the propagation
/// path.
///
/// # Contract
///
/// - `get_labeled` distinguishes an unknown credential
///   ([`StoreError::NotFound`]) from a known credential missing the label
///   (`Ok(None)`).
/// - `put_pending` is idempotent under one owner token and refuses to
///   overwrite a pending version staged by a different token
///   ([`StoreError::PendingInFlight`]) — this is the serialization point for
///   concurrent rotations.
/// - `promote` atomically relabels `pending` → `current` and `current` →
///   `previous`, discarding any prior `previous`. No observer may see zero
///   or two `current` versions.
/// - `invalidate` revokes the version under a label; revoking an absent
///   label is a no-op so resumed workflows stay idempotent.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetches the version currently under `label`, if any.
    async fn get_labeled(
        &self,
        id: &CredentialId,
        label: VersionLabel,
    ) -> Result<Option<SecretVersion>, StoreError>;

    /// Stages a candidate version under the `pending` label, owned by the
    /// given rotation token.
    async fn put_pending(
        &self,
        id: &CredentialId,
        values: ValueSet,
        owner: &RotationToken,
    ) -> Result<SecretVersion, StoreError>;

    /// Atomically relabels `pending` → `current` and `current` → `previous`.
    async fn promote(&self, id: &CredentialId) -> Result<Promotion, StoreError>;

    /// Revokes the version under `label`.
    async fn invalidate(&self, id: &CredentialId, label: VersionLabel) -> Result<(), StoreError>;
}
