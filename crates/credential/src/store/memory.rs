//! In-memory secret store for tests and single-process deployments.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::{CredentialId, RotationToken, ValueSet};

use super::{Promotion, SecretStore, SecretVersion, StoreError, VersionId, VersionLabel};

/// Labeled versions of one credential.
#[derive(Debug, Default, Clone)]
struct LabelSet {
    current: Option<SecretVersion>,
    pending: Option<SecretVersion>,
    previous: Option<SecretVersion>,
}

/// In-memory [`SecretStore`] implementation.
///
/// The whole label set of a credential lives under one lock, which makes
/// `promote` trivially atomic: no reader can observe the intermediate state
/// where `pending` has moved but `current` has not.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    credentials: RwLock<HashMap<CredentialId, LabelSet>>,
}

impl InMemorySecretStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a credential with an initial `current` version, as provisioning
    /// would before the first rotation.
    pub async fn seed_current(&self, id: &CredentialId, values: ValueSet) -> SecretVersion {
        let version = SecretVersion {
            version_id: VersionId::new(),
            values,
            owner: None,
            created_at: Utc::now(),
        };
        let mut credentials = self.credentials.write().await;
        credentials.entry(id.clone()).or_default().current = Some(version.clone());
        version
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_labeled(
        &self,
        id: &CredentialId,
        label: VersionLabel,
    ) -> Result<Option<SecretVersion>, StoreError> {
        let credentials = self.credentials.read().await;
        let labels = credentials
            .get(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;

        let version = match label {
            VersionLabel::Current => labels.current.clone(),
            VersionLabel::Pending => labels.pending.clone(),
            VersionLabel::Previous => labels.previous.clone(),
        };
        Ok(version)
    }

    async fn put_pending(
        &self,
        id: &CredentialId,
        values: ValueSet,
        owner: &RotationToken,
    ) -> Result<SecretVersion, StoreError> {
        let mut credentials = self.credentials.write().await;
        let labels = credentials.entry(id.clone()).or_default();

        if let Some(pending) = &labels.pending {
            if pending.owner.as_ref() == Some(owner) {
                // Same rotation retrying: hand back the staged version.
                return Ok(pending.clone());
            }
            return Err(StoreError::PendingInFlight { id: id.clone() });
        }

        let version = SecretVersion {
            version_id: VersionId::new(),
            values,
            owner: Some(owner.clone()),
            created_at: Utc::now(),
        };
        labels.pending = Some(version.clone());
        Ok(version)
    }

    async fn promote(&self, id: &CredentialId) -> Result<Promotion, StoreError> {
        let mut credentials = self.credentials.write().await;
        let labels = credentials
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;

        let Some(pending) = labels.pending.take() else {
            return Err(StoreError::MissingLabel {
                id: id.clone(),
                label: VersionLabel::Pending,
            });
        };

        // Single assignment chain under the write lock; any prior `previous`
        // is discarded by the overwrite.
        let demoted = labels.current.replace(pending.clone());
        labels.previous = demoted.clone();

        Ok(Promotion {
            current: pending,
            previous: demoted,
        })
    }

    async fn invalidate(&self, id: &CredentialId, label: VersionLabel) -> Result<(), StoreError> {
        let mut credentials = self.credentials.write().await;
        let labels = credentials
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;

        match label {
            VersionLabel::Current => {
                // Revoking `current` would leave no working credential.
                return Err(StoreError::Rejected {
                    id: id.clone(),
                    operation: "invalidate",
                    reason: "refusing to invalidate the current version".to_string(),
                });
            }
            VersionLabel::Pending => labels.pending = None,
            VersionLabel::Previous => labels.previous = None,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> ValueSet {
        pairs.iter().copied().collect()
    }

    fn id(name: &str) -> CredentialId {
        CredentialId::new(name).unwrap()
    }

    #[tokio::test]
    async fn unknown_credential_is_not_found() {
        let store = InMemorySecretStore::new();
        let result = store.get_labeled(&id("missing"), VersionLabel::Current).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn known_credential_without_label_reads_none() {
        let store = InMemorySecretStore::new();
        store.seed_current(&id("cred"), values(&[("password", "v1")])).await;

        let pending = store.get_labeled(&id("cred"), VersionLabel::Pending).await.unwrap();
        assert!(pending.is_none());
    }

    #[tokio::test]
    async fn put_pending_is_idempotent_per_owner() {
        let store = InMemorySecretStore::new();
        let token = RotationToken::generate();

        let first = store
            .put_pending(&id("cred"), values(&[("password", "v2")]), &token)
            .await
            .unwrap();
        let second = store
            .put_pending(&id("cred"), values(&[("password", "v2-other")]), &token)
            .await
            .unwrap();

        assert_eq!(first.version_id, second.version_id);
        assert_eq!(second.values.get("password").unwrap().expose(), "v2");
    }

    #[tokio::test]
    async fn put_pending_refuses_other_owner() {
        let store = InMemorySecretStore::new();
        let first_token = RotationToken::generate();
        let second_token = RotationToken::generate();

        store
            .put_pending(&id("cred"), values(&[("password", "v2")]), &first_token)
            .await
            .unwrap();
        let result = store
            .put_pending(&id("cred"), values(&[("password", "v2b")]), &second_token)
            .await;

        assert!(matches!(result, Err(StoreError::PendingInFlight { .. })));
    }

    #[tokio::test]
    async fn promote_relabels_atomically() {
        let store = InMemorySecretStore::new();
        let token = RotationToken::generate();
        let cred = id("cred");

        let v1 = store.seed_current(&cred, values(&[("password", "v1")])).await;
        let v2 = store
            .put_pending(&cred, values(&[("password", "v2")]), &token)
            .await
            .unwrap();

        let promotion = store.promote(&cred).await.unwrap();
        assert_eq!(promotion.current.version_id, v2.version_id);
        assert_eq!(promotion.previous.as_ref().unwrap().version_id, v1.version_id);

        let current = store.get_labeled(&cred, VersionLabel::Current).await.unwrap().unwrap();
        let previous = store.get_labeled(&cred, VersionLabel::Previous).await.unwrap().unwrap();
        let pending = store.get_labeled(&cred, VersionLabel::Pending).await.unwrap();

        assert_eq!(current.version_id, v2.version_id);
        assert_eq!(previous.version_id, v1.version_id);
        assert!(pending.is_none(), "exactly one label per version");
    }

    #[tokio::test]
    async fn promote_discards_older_previous() {
        let store = InMemorySecretStore::new();
        let cred = id("cred");
        store.seed_current(&cred, values(&[("password", "v1")])).await;

        for value in ["v2", "v3"] {
            let token = RotationToken::generate();
            store
                .put_pending(&cred, values(&[("password", value)]), &token)
                .await
                .unwrap();
            store.promote(&cred).await.unwrap();
        }

        let previous = store.get_labeled(&cred, VersionLabel::Previous).await.unwrap().unwrap();
        assert_eq!(previous.values.get("password").unwrap().expose(), "v2");
    }

    #[tokio::test]
    async fn promote_without_pending_is_rejected() {
        let store = InMemorySecretStore::new();
        let cred = id("cred");
        store.seed_current(&cred, values(&[("password", "v1")])).await;

        let result = store.promote(&cred).await;
        assert!(matches!(
            result,
            Err(StoreError::MissingLabel {
                label: VersionLabel::Pending,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn invalidate_previous_is_idempotent() {
        let store = InMemorySecretStore::new();
        let token = RotationToken::generate();
        let cred = id("cred");

        store.seed_current(&cred, values(&[("password", "v1")])).await;
        store
            .put_pending(&cred, values(&[("password", "v2")]), &token)
            .await
            .unwrap();
        store.promote(&cred).await.unwrap();

        store.invalidate(&cred, VersionLabel::Previous).await.unwrap();
        // Resumed workflows may invalidate again; that must be a no-op.
        store.invalidate(&cred, VersionLabel::Previous).await.unwrap();

        let previous = store.get_labeled(&cred, VersionLabel::Previous).await.unwrap();
        assert!(previous.is_none());
    }

    #[tokio::test]
    async fn invalidate_current_is_refused() {
        let store = InMemorySecretStore::new();
        let cred = id("cred");
        store.seed_current(&cred, values(&[("password", "v1")])).await;

        let result = store.invalidate(&cred, VersionLabel::Current).await;
        assert!(matches!(result, Err(StoreError::Rejected { .. })));

        let current = store.get_labeled(&cred, VersionLabel::Current).await.unwrap();
        assert!(current.is_some());
    }
}
