//! Rotation-specific error types.

use thiserror::Error;

use crate::core::CredentialId;

use super::step::RotationStep;

/// Errors that can occur while rotating a credential.
#[derive(Debug, Error)]
pub enum RotationError {
    /// Another rotation token holds the pending version of this credential.
    ///
    /// Concurrent attempts must be serialized by the caller; the loser is
    /// surfaced rather than retried so an operator can decide which attempt
    /// wins.
    #[error("rotation already in progress for credential {credential_id}")]
    Conflict {
        /// The contested credential.
        credential_id: CredentialId,
    },

    /// A step failed after exhausting its retry budget (or failed with a
    /// non-retryable error).
    ///
    /// Carries the step reached so the scheduler can re-invoke with the same
    /// rotation token: `create_pending` and `set_pending` are idempotent
    /// under the token, so a rerun resumes rather than restarts.
    #[error("rotation failed at step {step} for credential {credential_id}: {reason}")]
    RotationFailed {
        /// The credential being rotated.
        credential_id: CredentialId,
        /// The step that failed.
        step: RotationStep,
        /// Description of the failure, never containing secret material.
        reason: String,
    },
}

impl RotationError {
    /// The step at which the rotation stopped, if the error carries one.
    pub fn failed_step(&self) -> Option<RotationStep> {
        match self {
            Self::Conflict { .. } => Some(RotationStep::CreatePending),
            Self::RotationFailed { step, .. } => Some(*step),
        }
    }
}

/// Result type for rotation operations.
pub type RotationResult<T> = Result<T, RotationError>;
