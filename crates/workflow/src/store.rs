//! Durable storage for workflow records.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::record::{DeletionRecord, WorkflowId};

/// Errors surfaced by workflow state persistence.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// A record could not be encoded or decoded.
    #[error("workflow record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("workflow state store error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// Persists [`DeletionRecord`]s so the `Waiting` suspension survives
/// process restarts.
///
/// `save` overwrites by workflow id; `load` returns `Ok(None)` for an
/// unknown id.
#[async_trait]
pub trait WorkflowStateStore: Send + Sync {
    /// Persists the record, replacing any prior version.
    async fn save(&self, record: &DeletionRecord) -> Result<(), StateStoreError>;

    /// Loads a record by workflow id.
    async fn load(&self, id: &WorkflowId) -> Result<Option<DeletionRecord>, StateStoreError>;
}

/// In-memory [`WorkflowStateStore`] for tests and single-process
/// deployments.
///
/// Records are kept in their serialized form so the round-trip through
/// persistence is exercised even in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    records: RwLock<HashMap<WorkflowId, String>>,
}

impl InMemoryWorkflowStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStateStore for InMemoryWorkflowStore {
    async fn save(&self, record: &DeletionRecord) -> Result<(), StateStoreError> {
        let encoded = serde_json::to_string(record)?;
        let mut records = self.records.write().await;
        records.insert(record.workflow_id.clone(), encoded);
        Ok(())
    }

    async fn load(&self, id: &WorkflowId) -> Result<Option<DeletionRecord>, StateStoreError> {
        let records = self.records.read().await;
        records
            .get(id)
            .map(|encoded| serde_json::from_str(encoded).map_err(StateStoreError::from))
            .transpose()
    }
}
