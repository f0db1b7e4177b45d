//! Workflow-specific error types.

use thiserror::Error;

use crate::record::WorkflowId;
use crate::scheduler::ScheduleError;
use crate::store::StateStoreError;

/// Errors that can occur while driving a grace-period deletion workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No record exists for the workflow id.
    #[error("workflow {workflow_id} not found")]
    NotFound {
        /// The unknown workflow id.
        workflow_id: WorkflowId,
    },

    /// Publishing never succeeded within the attempt budget. The workflow
    /// is `Failed` and the old credential is deliberately left valid.
    #[error("publishing did not succeed after {attempts} attempts for workflow {workflow_id}")]
    PublishFailed {
        /// The failed workflow.
        workflow_id: WorkflowId,
        /// Total publish attempts made, across resumes.
        attempts: u32,
    },

    /// The workflow was cancelled before invalidation began. The record is
    /// left as persisted; a later resume picks up where it stood.
    #[error("workflow {workflow_id} cancelled before invalidation")]
    Cancelled {
        /// The cancelled workflow.
        workflow_id: WorkflowId,
    },

    /// The persisted record is inconsistent with its stage.
    #[error("workflow record for {workflow_id} is invalid: {reason}")]
    InvalidRecord {
        /// The workflow with the bad record.
        workflow_id: WorkflowId,
        /// What is wrong with it.
        reason: String,
    },

    /// The propagation plan failed validation; nothing was published.
    #[error(transparent)]
    Plan(#[from] keyrelay_propagation::PlanError),

    /// Workflow state could not be persisted or loaded.
    #[error(transparent)]
    State(#[from] StateStoreError),

    /// A wake-up could not be registered.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
