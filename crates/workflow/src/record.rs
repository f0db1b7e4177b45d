//! The durable workflow instance record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use keyrelay_credential::{CredentialId, RotationToken};

use crate::stage::DeletionStage;

/// Unique identifier for a deletion workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    /// Generates a new workflow id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for WorkflowId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Grace window configuration.
///
/// The duration is chosen by the caller; the workflow only enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraceConfig {
    /// How long both the new and the old credential stay valid.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl GraceConfig {
    /// Creates a grace configuration.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// The deadline a grace window starting at `start` runs to, or `None`
    /// on overflow.
    pub fn deadline_from(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(self.duration)
            .ok()
            .and_then(|d| start.checked_add_signed(d))
    }
}

/// Persisted state of one grace-period deletion workflow.
///
/// The record is the durable half of the workflow: everything needed to
/// resume after a process restart lives here, and nothing in it is secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionRecord {
    /// Identifier the workflow is resumed by.
    pub workflow_id: WorkflowId,

    /// The credential whose old version is being retired.
    pub credential_id: CredentialId,

    /// The rotation attempt this deletion belongs to.
    pub rotation_token: RotationToken,

    /// Current stage.
    pub stage: DeletionStage,

    /// The configured grace duration.
    #[serde(with = "humantime_serde")]
    pub grace: Duration,

    /// When the grace window elapses. Set on entry to `Waiting`.
    pub grace_deadline: Option<DateTime<Utc>>,

    /// Publish attempts made so far, across resumes.
    pub publish_attempts: u32,

    /// Failure or cleanup note. Set when the workflow fails, and when
    /// invalidation is refused and the old version is left for manual
    /// cleanup.
    pub note: Option<String>,

    /// When the workflow started.
    pub started_at: DateTime<Utc>,

    /// Last persisted change.
    pub updated_at: DateTime<Utc>,
}

impl DeletionRecord {
    /// Creates a fresh record in the `Publishing` stage.
    pub fn new(
        credential_id: CredentialId,
        rotation_token: RotationToken,
        grace: GraceConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: WorkflowId::new(),
            credential_id,
            rotation_token,
            stage: DeletionStage::Publishing,
            grace: grace.duration,
            grace_deadline: None,
            publish_attempts: 0,
            note: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` once the grace deadline has passed.
    pub fn deadline_reached(&self, now: DateTime<Utc>) -> bool {
        self.grace_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Collapses the remaining grace window so the next resume proceeds
    /// straight to invalidation. The emergency path for a compromised old
    /// credential.
    pub fn force_expire(&mut self) {
        if self.stage == DeletionStage::Waiting {
            self.grace_deadline = Some(Utc::now());
            self.touch();
        }
    }

    /// Refreshes the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DeletionRecord {
        DeletionRecord::new(
            CredentialId::new("npm-login").unwrap(),
            RotationToken::generate(),
            GraceConfig::new(Duration::from_secs(24 * 3600)),
        )
    }

    #[test]
    fn fresh_record_starts_publishing() {
        let record = record();
        assert_eq!(record.stage, DeletionStage::Publishing);
        assert!(record.grace_deadline.is_none());
        assert_eq!(record.publish_attempts, 0);
    }

    #[test]
    fn deadline_is_start_plus_grace() {
        let grace = GraceConfig::new(Duration::from_secs(3600));
        let start = Utc::now();
        let deadline = grace.deadline_from(start).unwrap();

        let delta = deadline - start;
        assert_eq!(delta.num_seconds(), 3600);
    }

    #[test]
    fn deadline_reached_only_after_deadline() {
        let mut record = record();
        let now = Utc::now();
        assert!(!record.deadline_reached(now), "no deadline set yet");

        record.grace_deadline = Some(now + chrono::Duration::hours(1));
        assert!(!record.deadline_reached(now));
        assert!(record.deadline_reached(now + chrono::Duration::hours(2)));
    }

    #[test]
    fn force_expire_collapses_waiting_window() {
        let mut record = record();
        record.stage = DeletionStage::Waiting;
        record.grace_deadline = Some(Utc::now() + chrono::Duration::days(7));

        record.force_expire();
        assert!(record.deadline_reached(Utc::now()));
    }

    #[test]
    fn force_expire_is_a_noop_outside_waiting() {
        let mut record = record();
        record.force_expire();
        assert!(record.grace_deadline.is_none());
    }

    #[test]
    fn record_serde_roundtrip() {
        let record = record();
        let json = serde_json::to_string(&record).unwrap();
        let back: DeletionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
