//! Error types for the propagation pipeline.
//!
//! Each stage of a pair (resolve → map → publish) has its own error enum;
//! the runner folds them into per-pair report entries without aborting
//! sibling pairs. None of these errors ever carry secret material — field
//! and key *names* only.

use thiserror::Error;

use keyrelay_credential::{CredentialId, Retryable, StoreError};

/// Errors produced while resolving a source into a value-set.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The caller is not permitted to assume the configured role.
    #[error("not authorized to assume role {role:?}")]
    Authorization {
        /// The refused role.
        role: String,
    },

    /// The assumed session could not be created.
    #[error("session for role {role:?} could not be created: {reason}")]
    SessionExpired {
        /// The role a session was requested for.
        role: String,
        /// Broker-supplied reason.
        reason: String,
    },

    /// The named environment variable is absent.
    #[error("environment variable {name:?} is not set")]
    MissingVariable {
        /// The missing variable name.
        name: String,
    },

    /// The credential id is unknown to the secret store.
    #[error("credential not found: {id}")]
    NotFound {
        /// The unknown credential id.
        id: CredentialId,
    },

    /// The credential exists but has no `current` version — a rotation is
    /// mid-flight. Retried after a short delay.
    #[error("credential {id} has no current version (rotation in flight)")]
    StaleRead {
        /// The credential being read.
        id: CredentialId,
    },

    /// The secret store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Retryable for ResolutionError {
    fn is_transient(&self) -> bool {
        match self {
            Self::StaleRead { .. } => true,
            Self::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Errors produced while applying a mapping rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    /// A rule entry references a field the resolved value-set does not
    /// contain. No partial output is produced.
    #[error("mapping references field {field:?} which the resolved value-set does not contain")]
    UnresolvedField {
        /// The missing source field.
        field: String,
    },
}

/// Errors produced while publishing a mapped value-set to a destination.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The destination rejected the write token.
    #[error("destination token rejected for project {project:?}")]
    Auth {
        /// The target project.
        project: String,
    },

    /// The target project is unknown to the destination system.
    #[error("destination project not found: {project:?}")]
    ProjectNotFound {
        /// The unknown project.
        project: String,
    },

    /// Some keys were written and others were not. Treated as failure of
    /// the whole pair; environment variables overwrite idempotently, so the
    /// pair is retried as a whole.
    #[error("partial write to project {project:?}: {} keys written, {} failed", written.len(), failed.len())]
    Partial {
        /// The target project.
        project: String,
        /// Keys that were written.
        written: Vec<String>,
        /// Keys that failed or were not attempted.
        failed: Vec<String>,
    },

    /// The destination's own write token could not be resolved.
    #[error("failed to resolve destination token: {source}")]
    TokenResolution {
        /// The underlying resolution failure.
        source: ResolutionError,
    },

    /// The resolved token value-set has no field under the configured name.
    #[error("resolved token value-set has no field {field:?}")]
    TokenField {
        /// The configured token field name.
        field: String,
    },

    /// The destination could not be reached.
    #[error("transport error publishing to project {project:?}: {message}")]
    Transport {
        /// The target project.
        project: String,
        /// Description of the failure.
        message: String,
    },
}

/// Errors produced while decoding or validating a propagation plan.
///
/// Plan errors fail fast: a run against an invalid plan never starts.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A source references a destination specifier with no entry in the
    /// destinations table.
    #[error("destination specifier {specifier:?} has no entry in destinations")]
    UnknownDestination {
        /// The dangling specifier.
        specifier: String,
    },

    /// Two rule entries (within one rule or across sources targeting the
    /// same destination) write the same destination key.
    #[error("duplicate destination key {key:?} for destination {specifier:?}")]
    DuplicateDestinationKey {
        /// The destination specifier.
        specifier: String,
        /// The duplicated key.
        key: String,
    },

    /// The plan document could not be encoded or decoded.
    #[error("propagation plan JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
