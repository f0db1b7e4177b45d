//! Collaborator traits for the rotation machine.
//!
//! The machine itself only moves labels around in the secret store; the
//! system the credential actually authenticates to is reached through
//! [`CredentialBackend`], and candidate material comes from a
//! [`SecretGenerator`]. Both are injected, so the same machine rotates npm
//! logins, API tokens, or database passwords.

use async_trait::async_trait;
use rand::Rng;
use rand::distr::Alphanumeric;
use thiserror::Error;

use crate::core::{CredentialId, SecretString, ValueSet};
use crate::retry::Retryable;

/// Errors surfaced by the authenticating system behind a credential.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend refused the candidate or the probe.
    #[error("backend rejected the operation: {reason}")]
    Rejected {
        /// Backend-supplied refusal reason.
        reason: String,
    },

    /// The backend or the network failed transiently.
    #[error("transient backend error: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },
}

impl Retryable for BackendError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// The system a credential authenticates to.
///
/// Implementations talk to the real account (an npm registry user, a
/// database role, an API token issuer) through its documented management
/// API.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Registers the candidate as a *secondary* valid credential, so the
    /// account accepts both the current and the pending value.
    ///
    /// Must be idempotent: the machine repeats this step when resuming a
    /// rotation with the same token.
    async fn register_secondary(
        &self,
        id: &CredentialId,
        candidate: &ValueSet,
    ) -> Result<(), BackendError>;

    /// Exercises the candidate with a read-only or otherwise
    /// non-destructive operation against the real system.
    async fn probe(&self, id: &CredentialId, candidate: &ValueSet) -> Result<(), BackendError>;
}

/// Produces candidate secret material for a credential.
pub trait SecretGenerator: Send + Sync {
    /// Generates a fresh candidate value-set.
    fn generate(&self, id: &CredentialId) -> ValueSet;
}

/// Generates a single random alphanumeric secret under a configurable field
/// name. Suitable for password- and token-shaped credentials.
#[derive(Debug, Clone)]
pub struct AlphanumericGenerator {
    field: String,
    length: usize,
}

impl AlphanumericGenerator {
    /// Creates a generator writing a secret of `length` characters under
    /// `field`.
    pub fn new(field: impl Into<String>, length: usize) -> Self {
        Self {
            field: field.into(),
            length,
        }
    }
}

impl Default for AlphanumericGenerator {
    fn default() -> Self {
        Self::new("password", 32)
    }
}

impl SecretGenerator for AlphanumericGenerator {
    fn generate(&self, _id: &CredentialId) -> ValueSet {
        let value: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();

        let mut values = ValueSet::new();
        values.insert(self.field.clone(), SecretString::new(value));
        values
    }
}
