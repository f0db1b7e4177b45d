//! The grace-period deletion workflow driver.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use keyrelay_credential::{
    CredentialId, RetryPolicy, RotationOutcome, RotationToken, SecretStore, VersionLabel,
    retry_with_backoff,
};
use keyrelay_propagation::{PropagationPlan, PropagationRunner};

use crate::error::{WorkflowError, WorkflowResult};
use crate::record::{DeletionRecord, GraceConfig, WorkflowId};
use crate::scheduler::ResumeScheduler;
use crate::stage::DeletionStage;
use crate::store::WorkflowStateStore;

/// Decouples "make the new credential live" from "kill the old credential"
/// by a grace window.
///
/// The workflow is a resumable state machine over a persisted
/// [`DeletionRecord`]: `publishing → waiting → invalidating → done`, with
/// `failed` reachable from any stage. Each call to [`start`] or [`resume`]
/// advances the record as far as it can and persists every transition, so a
/// process restart loses nothing — the `waiting` suspension in particular
/// is a stored deadline plus a scheduled wake-up, never an in-memory sleep.
///
/// Two ordering guarantees hold unconditionally:
///
/// - invalidation never runs unless publishing succeeded, and
/// - a publishing failure leaves the old credential valid — a window with
///   no working credential anywhere is the one state this workflow exists
///   to prevent.
///
/// [`start`]: GraceDeletionWorkflow::start
/// [`resume`]: GraceDeletionWorkflow::resume
pub struct GraceDeletionWorkflow {
    secrets: Arc<dyn SecretStore>,
    state: Arc<dyn WorkflowStateStore>,
    scheduler: Arc<dyn ResumeScheduler>,
    runner: PropagationRunner,
    plan: PropagationPlan,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl GraceDeletionWorkflow {
    /// Creates a workflow driver over the given collaborators.
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        state: Arc<dyn WorkflowStateStore>,
        scheduler: Arc<dyn ResumeScheduler>,
        runner: PropagationRunner,
        plan: PropagationPlan,
    ) -> Self {
        Self {
            secrets,
            state,
            scheduler,
            runner,
            plan,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the retry policy used for publishing and invalidation.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Installs a cancellation token. Cancellation is honored up to the
    /// moment `invalidating` is entered; after that, invalidation is
    /// attempted at least once.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Starts a new deletion workflow for a freshly promoted credential.
    pub async fn start(
        &self,
        credential_id: CredentialId,
        rotation_token: RotationToken,
        grace: GraceConfig,
    ) -> WorkflowResult<DeletionRecord> {
        let record = DeletionRecord::new(credential_id, rotation_token, grace);
        tracing::info!(
            workflow_id = %record.workflow_id,
            credential_id = %record.credential_id,
            "starting grace-period deletion workflow"
        );
        self.state.save(&record).await?;
        self.advance(record).await
    }

    /// Starts a deletion workflow from a successful rotation outcome.
    pub async fn start_for_rotation(
        &self,
        outcome: &RotationOutcome,
        grace: GraceConfig,
    ) -> WorkflowResult<DeletionRecord> {
        self.start(
            outcome.credential_id.clone(),
            outcome.token.clone(),
            grace,
        )
        .await
    }

    /// Resumes a persisted workflow, typically from a scheduled wake-up or
    /// after a process restart. Resuming a terminal workflow is a no-op.
    pub async fn resume(&self, workflow_id: &WorkflowId) -> WorkflowResult<DeletionRecord> {
        let record = self
            .state
            .load(workflow_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound {
                workflow_id: workflow_id.clone(),
            })?;
        self.advance(record).await
    }

    /// Advances the record as far as it can go right now.
    async fn advance(&self, mut record: DeletionRecord) -> WorkflowResult<DeletionRecord> {
        loop {
            match record.stage {
                DeletionStage::Publishing => {
                    // On success the record is left suspended in `waiting`
                    // with a wake-up registered.
                    return self.publish(record).await;
                }
                DeletionStage::Waiting => {
                    let Some(deadline) = record.grace_deadline else {
                        return Err(WorkflowError::InvalidRecord {
                            workflow_id: record.workflow_id.clone(),
                            reason: "waiting without a grace deadline".to_string(),
                        });
                    };

                    if Utc::now() < deadline {
                        // Not due yet; re-register the wake-up and park.
                        self.scheduler
                            .schedule(record.workflow_id.clone(), deadline)
                            .await?;
                        return Ok(record);
                    }

                    // Last moment cancellation is honored: once the stage
                    // below is persisted, invalidation runs at least once.
                    if self.cancel.is_cancelled() {
                        tracing::info!(
                            workflow_id = %record.workflow_id,
                            "cancelled before invalidation"
                        );
                        return Err(WorkflowError::Cancelled {
                            workflow_id: record.workflow_id.clone(),
                        });
                    }

                    record.stage = DeletionStage::Invalidating;
                    record.touch();
                    self.state.save(&record).await?;
                }
                DeletionStage::Invalidating => {
                    record = self.invalidate(record).await?;
                }
                DeletionStage::Done | DeletionStage::Failed => return Ok(record),
            }
        }
    }

    /// `publishing`: run the propagation runner until the whole plan
    /// succeeds or the attempt budget is spent.
    async fn publish(&self, mut record: DeletionRecord) -> WorkflowResult<DeletionRecord> {
        if self.cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled {
                workflow_id: record.workflow_id.clone(),
            });
        }

        let mut published = false;
        for attempt in 0..self.retry.max_attempts {
            record.publish_attempts += 1;

            let report = match self.runner.run(&self.plan).await {
                Ok(report) => report,
                Err(plan_error) => {
                    // Configuration failures are not retried.
                    record.stage = DeletionStage::Failed;
                    record.note = Some(format!("propagation plan invalid: {plan_error}"));
                    record.touch();
                    self.state.save(&record).await?;
                    return Err(plan_error.into());
                }
            };

            if report.is_success() {
                published = true;
                break;
            }

            tracing::warn!(
                workflow_id = %record.workflow_id,
                status = %report.status(),
                attempt = attempt + 1,
                max_attempts = self.retry.max_attempts,
                "publish run did not fully succeed"
            );
            if attempt + 1 < self.retry.max_attempts {
                sleep(self.retry.backoff_duration(attempt)).await;
            }
        }

        if !published {
            record.stage = DeletionStage::Failed;
            record.note =
                Some("publishing did not succeed; previous version left valid".to_string());
            record.touch();
            self.state.save(&record).await?;
            return Err(WorkflowError::PublishFailed {
                workflow_id: record.workflow_id.clone(),
                attempts: record.publish_attempts,
            });
        }

        let deadline = GraceConfig::new(record.grace)
            .deadline_from(Utc::now())
            .ok_or_else(|| WorkflowError::InvalidRecord {
                workflow_id: record.workflow_id.clone(),
                reason: "grace duration overflows the deadline computation".to_string(),
            })?;

        record.stage = DeletionStage::Waiting;
        record.grace_deadline = Some(deadline);
        record.touch();
        self.state.save(&record).await?;
        self.scheduler
            .schedule(record.workflow_id.clone(), deadline)
            .await?;

        tracing::info!(
            workflow_id = %record.workflow_id,
            credential_id = %record.credential_id,
            grace_deadline = %deadline,
            "new credential published, grace window open"
        );
        Ok(record)
    }

    /// `invalidating`: revoke the `previous` version. A store refusal is
    /// reported but non-fatal — the new credential is already live, and a
    /// stale old credential is harmless; it is flagged for manual cleanup.
    async fn invalidate(&self, mut record: DeletionRecord) -> WorkflowResult<DeletionRecord> {
        let result = retry_with_backoff(&self.retry, "invalidate_previous", || async {
            self.secrets
                .invalidate(&record.credential_id, VersionLabel::Previous)
                .await
        })
        .await;

        match result {
            Ok(()) => {
                tracing::info!(
                    workflow_id = %record.workflow_id,
                    credential_id = %record.credential_id,
                    "previous version invalidated"
                );
            }
            Err(err) => {
                tracing::error!(
                    workflow_id = %record.workflow_id,
                    credential_id = %record.credential_id,
                    error = %err,
                    "invalidation failed; previous version left in place for manual cleanup"
                );
                record.note = Some(format!("invalidation failed: {err}"));
            }
        }

        record.stage = DeletionStage::Done;
        record.touch();
        self.state.save(&record).await?;
        Ok(record)
    }
}
