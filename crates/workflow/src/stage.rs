//! Deletion workflow stage tracking.

use serde::{Deserialize, Serialize};

/// The stage a grace-period deletion workflow has reached.
///
/// Stages run strictly in order: publish the new credential, wait out the
/// grace window, invalidate the superseded version. `Failed` is reachable
/// from any stage; `Done` and `Failed` are terminal and idempotent on
/// re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStage {
    /// Publishing the new `current` value through the propagation runner.
    Publishing,
    /// Suspended until the grace deadline; survives process restarts.
    Waiting,
    /// Invalidating the `previous`-labeled version at the store.
    Invalidating,
    /// Finished; the old version is gone (or flagged for manual cleanup).
    Done,
    /// Publishing never succeeded; the old credential stays valid.
    Failed,
}

impl DeletionStage {
    /// Returns `true` if the workflow will not progress further.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns `true` while the workflow still holds a live suspension.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl std::fmt::Display for DeletionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Publishing => write!(f, "publishing"),
            Self::Waiting => write!(f, "waiting"),
            Self::Invalidating => write!(f, "invalidating"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
