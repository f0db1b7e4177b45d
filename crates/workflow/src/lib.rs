#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Keyrelay Workflow
//!
//! The grace-period deletion workflow: publish the new credential now,
//! invalidate the old one after a wait, so holders of the old credential
//! get a bounded window to finish in-flight work.
//!
//! The workflow is a resumable state machine keyed by a durable
//! [`WorkflowId`]:
//!
//! - [`DeletionStage`] names the stages
//!   (`publishing → waiting → invalidating → done`, `failed` from anywhere);
//! - [`DeletionRecord`] is the persisted instance state;
//! - [`WorkflowStateStore`] persists records across process restarts;
//! - [`ResumeScheduler`] registers the wake-up that ends the `waiting`
//!   suspension — a durable timer seam, not an in-memory sleep;
//! - [`GraceDeletionWorkflow`] drives the stages.
//!
//! A typical driver wires the in-process scheduler's receiver back into
//! `resume`:
//!
//! ```ignore
//! let (scheduler, mut due) = TokioResumeScheduler::channel();
//! let workflow = Arc::new(GraceDeletionWorkflow::new(/* ... */));
//! tokio::spawn({
//!     let workflow = workflow.clone();
//!     async move {
//!         while let Some(id) = due.recv().await {
//!             if let Err(err) = workflow.resume(&id).await {
//!                 tracing::error!(workflow_id = %id, error = %err, "resume failed");
//!             }
//!         }
//!     }
//! });
//! ```

/// The workflow driver.
pub mod deletion;
/// Workflow error types.
pub mod error;
/// The durable instance record and grace configuration.
pub mod record;
/// The scheduled-resume seam.
pub mod scheduler;
/// Stage tracking.
pub mod stage;
/// Record persistence.
pub mod store;

pub use crate::deletion::GraceDeletionWorkflow;
pub use crate::error::{WorkflowError, WorkflowResult};
pub use crate::record::{DeletionRecord, GraceConfig, WorkflowId};
pub use crate::scheduler::{ResumeScheduler, ScheduleError, TokioResumeScheduler};
pub use crate::stage::DeletionStage;
pub use crate::store::{InMemoryWorkflowStore, StateStoreError, WorkflowStateStore};
