//! The four-step rotation driver.

use std::sync::Arc;

use crate::core::{CredentialId, RotationToken};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::store::{Promotion, SecretStore, SecretVersion, StoreError, VersionLabel};

use super::backend::{CredentialBackend, SecretGenerator};
use super::error::{RotationError, RotationResult};
use super::step::RotationStep;

/// A request to rotate one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationRequest {
    /// The credential to rotate.
    pub credential_id: CredentialId,

    /// Idempotency token scoping this rotation attempt. Re-invoking with the
    /// same token resumes past the steps already completed.
    pub token: RotationToken,
}

impl RotationRequest {
    /// Creates a rotation request.
    pub fn new(credential_id: CredentialId, token: RotationToken) -> Self {
        Self {
            credential_id,
            token,
        }
    }
}

/// The result of a successful rotation.
#[derive(Debug, Clone)]
pub struct RotationOutcome {
    /// The rotated credential.
    pub credential_id: CredentialId,

    /// The token that drove the rotation, carried forward so the deletion
    /// workflow can be keyed to the same attempt.
    pub token: RotationToken,

    /// The new `current` version.
    pub current: SecretVersion,

    /// The superseded version, now `previous` and awaiting grace-period
    /// invalidation. Absent on the very first rotation of a credential.
    pub previous: Option<SecretVersion>,
}

/// Drives the staged rotation protocol against a secret store and the
/// credential's authenticating backend.
///
/// Steps execute strictly in order. Transient store and backend failures are
/// retried under the configured policy; exhaustion or a hard refusal
/// surfaces [`RotationError::RotationFailed`] carrying the step reached, so
/// the scheduler can re-invoke with the same token and resume. The machine
/// never touches the `previous` label — invalidation belongs to the
/// grace-period deletion workflow.
pub struct RotationMachine {
    store: Arc<dyn SecretStore>,
    backend: Arc<dyn CredentialBackend>,
    generator: Arc<dyn SecretGenerator>,
    retry: RetryPolicy,
}

impl RotationMachine {
    /// Creates a machine with the default retry policy.
    pub fn new(
        store: Arc<dyn SecretStore>,
        backend: Arc<dyn CredentialBackend>,
        generator: Arc<dyn SecretGenerator>,
    ) -> Self {
        Self {
            store,
            backend,
            generator,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs the rotation to completion.
    ///
    /// On success the new `current` value is returned; triggering the
    /// grace-period deletion workflow from it is the caller's job, off the
    /// rotation path.
    pub async fn run(&self, request: &RotationRequest) -> RotationResult<RotationOutcome> {
        let id = &request.credential_id;
        tracing::info!(credential_id = %id, token = %request.token, "starting rotation");

        let pending = self.create_pending(request).await?;
        self.set_pending(request, &pending).await?;
        self.test_pending(request, &pending).await?;
        let promotion = self.promote(request).await?;

        tracing::info!(
            credential_id = %id,
            new_version = %promotion.current.version_id,
            previous_version = ?promotion.previous.as_ref().map(|v| v.version_id.to_string()),
            "rotation complete"
        );

        Ok(RotationOutcome {
            credential_id: id.clone(),
            token: request.token.clone(),
            current: promotion.current,
            previous: promotion.previous,
        })
    }

    /// Step 1: stage a candidate under `pending`, reusing a version this
    /// token already staged.
    async fn create_pending(&self, request: &RotationRequest) -> RotationResult<SecretVersion> {
        let id = &request.credential_id;
        let step = RotationStep::CreatePending;

        let existing = match retry_with_backoff(&self.retry, "get_pending", || async {
            self.store.get_labeled(id, VersionLabel::Pending).await
        })
        .await
        {
            Ok(version) => version,
            // A credential the store has never seen simply has no pending.
            Err(StoreError::NotFound { .. }) => None,
            Err(err) => return Err(self.store_failure(request, step, &err)),
        };

        if let Some(pending) = existing {
            if pending.owner.as_ref() == Some(&request.token) {
                tracing::debug!(
                    credential_id = %id,
                    version = %pending.version_id,
                    "reusing pending version staged by this token"
                );
                return Ok(pending);
            }
            return Err(RotationError::Conflict {
                credential_id: id.clone(),
            });
        }

        let candidate = self.generator.generate(id);
        let staged = retry_with_backoff(&self.retry, "put_pending", || async {
            self.store
                .put_pending(id, candidate.clone(), &request.token)
                .await
        })
        .await
        .map_err(|err| self.store_failure(request, step, &err))?;

        tracing::info!(credential_id = %id, version = %staged.version_id, step = %step, "staged candidate version");
        Ok(staged)
    }

    /// Step 2: make the account accept the candidate as a secondary value.
    async fn set_pending(
        &self,
        request: &RotationRequest,
        pending: &SecretVersion,
    ) -> RotationResult<()> {
        let id = &request.credential_id;
        let step = RotationStep::SetPending;

        retry_with_backoff(&self.retry, "register_secondary", || async {
            self.backend.register_secondary(id, &pending.values).await
        })
        .await
        .map_err(|err| self.step_failure(request, step, &err))?;

        tracing::info!(credential_id = %id, step = %step, "candidate registered with backend");
        Ok(())
    }

    /// Step 3: probe the candidate. A failure here leaves `current`
    /// untouched — no partial promotion.
    async fn test_pending(
        &self,
        request: &RotationRequest,
        pending: &SecretVersion,
    ) -> RotationResult<()> {
        let id = &request.credential_id;
        let step = RotationStep::TestPending;

        retry_with_backoff(&self.retry, "probe_pending", || async {
            self.backend.probe(id, &pending.values).await
        })
        .await
        .map_err(|err| self.step_failure(request, step, &err))?;

        tracing::info!(credential_id = %id, step = %step, "candidate probe succeeded");
        Ok(())
    }

    /// Step 4: atomically relabel at the store.
    async fn promote(&self, request: &RotationRequest) -> RotationResult<Promotion> {
        let id = &request.credential_id;
        let step = RotationStep::Promote;

        let promotion = retry_with_backoff(&self.retry, "promote", || async {
            self.store.promote(id).await
        })
        .await
        .map_err(|err| self.store_failure(request, step, &err))?;

        Ok(promotion)
    }

    fn store_failure(
        &self,
        request: &RotationRequest,
        step: RotationStep,
        err: &StoreError,
    ) -> RotationError {
        if matches!(err, StoreError::PendingInFlight { .. }) {
            return RotationError::Conflict {
                credential_id: request.credential_id.clone(),
            };
        }
        self.step_failure(request, step, err)
    }

    fn step_failure(
        &self,
        request: &RotationRequest,
        step: RotationStep,
        err: &dyn std::fmt::Display,
    ) -> RotationError {
        tracing::error!(
            credential_id = %request.credential_id,
            step = %step,
            error = %err,
            "rotation step failed"
        );
        RotationError::RotationFailed {
            credential_id: request.credential_id.clone(),
            step,
            reason: err.to_string(),
        }
    }
}
