//! Validated identifier newtypes.
//!
//! [`CredentialId`] names one rotatable credential in the secret store.
//! [`RotationToken`] is the caller-supplied idempotency key scoping a single
//! rotation attempt. Both reject characters that could cause path traversal
//! or injection problems in store backends.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::ValidationError;

/// Maximum length for credential ids.
const MAX_ID_LENGTH: usize = 255;

/// Maximum length for rotation tokens.
const MAX_TOKEN_LENGTH: usize = 128;

/// Unique credential identifier (validated).
///
/// Only alphanumeric characters, hyphens, and underscores are allowed, with
/// a maximum length of 255 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialId(String);

impl CredentialId {
    /// Creates a new validated credential id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyCredentialId`] for an empty id and
    /// [`ValidationError::InvalidCredentialId`] when the id is too long or
    /// contains characters other than alphanumerics, hyphens, underscores.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();

        if id.is_empty() {
            return Err(ValidationError::EmptyCredentialId);
        }
        if id.len() > MAX_ID_LENGTH {
            return Err(ValidationError::InvalidCredentialId {
                id,
                reason: format!("exceeds maximum length of {MAX_ID_LENGTH} characters"),
            });
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidCredentialId {
                id,
                reason: "contains invalid characters (only alphanumeric, hyphens, underscores allowed)"
                    .to_string(),
            });
        }

        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<CredentialId> for String {
    fn from(id: CredentialId) -> Self {
        id.0
    }
}

impl TryFrom<String> for CredentialId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        CredentialId::new(s)
    }
}

/// Caller-supplied idempotency key scoping one rotation attempt.
///
/// The token serializes a rotation: the pending version it stages is owned by
/// it, repeating a step with the same token is a no-op past the point already
/// reached, and a different token touching the same credential mid-flight is
/// a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RotationToken(String);

impl RotationToken {
    /// Creates a new validated rotation token.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyRotationToken`] for an empty token and
    /// [`ValidationError::InvalidRotationToken`] when the token is too long
    /// or contains characters other than alphanumerics, hyphens, underscores.
    pub fn new(token: impl Into<String>) -> Result<Self, ValidationError> {
        let token = token.into();

        if token.is_empty() {
            return Err(ValidationError::EmptyRotationToken);
        }
        if token.len() > MAX_TOKEN_LENGTH {
            return Err(ValidationError::InvalidRotationToken {
                reason: format!("exceeds maximum length of {MAX_TOKEN_LENGTH} characters"),
            });
        }
        if !token
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidRotationToken {
                reason: "contains invalid characters (only alphanumeric, hyphens, underscores allowed)"
                    .to_string(),
            });
        }

        Ok(Self(token))
    }

    /// Generates a fresh random token for a new rotation attempt.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RotationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RotationToken> for String {
    fn from(token: RotationToken) -> Self {
        token.0
    }
}

impl TryFrom<String> for RotationToken {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        RotationToken::new(s)
    }
}
