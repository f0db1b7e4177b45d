//! Rotation step tracking.

use serde::{Deserialize, Serialize};

/// The step a rotation has reached.
///
/// Steps run strictly in order; each step's postcondition is the next step's
/// precondition. `Failed` is absorbing and records no progress past the step
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStep {
    /// Stage a candidate version under the `pending` label.
    CreatePending,
    /// Register the candidate as a secondary valid credential.
    SetPending,
    /// Probe the candidate against the real system.
    TestPending,
    /// Atomically relabel `pending` → `current`, `current` → `previous`.
    Promote,
    /// Rotation completed; the new version is `current`.
    Done,
    /// Rotation failed; `current` is untouched.
    Failed,
}

impl RotationStep {
    /// Returns `true` if the rotation will not progress further.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns `true` if the rotation completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for RotationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreatePending => write!(f, "create_pending"),
            Self::SetPending => write!(f, "set_pending"),
            Self::TestPending => write!(f, "test_pending"),
            Self::Promote => write!(f, "promote"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
