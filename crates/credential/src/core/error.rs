//! Validation errors for core identifier types.

use thiserror::Error;

/// Errors produced when constructing validated identifier types.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Credential id must not be empty.
    #[error("credential id must not be empty")]
    EmptyCredentialId,

    /// Credential id failed a validation rule.
    #[error("invalid credential id {id:?}: {reason}")]
    InvalidCredentialId { id: String, reason: String },

    /// Rotation token must not be empty.
    #[error("rotation token must not be empty")]
    EmptyRotationToken,

    /// Rotation token failed a validation rule.
    #[error("invalid rotation token: {reason}")]
    InvalidRotationToken { reason: String },
}
