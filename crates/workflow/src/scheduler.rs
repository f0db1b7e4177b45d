//! The scheduled-resume seam for the `Waiting` suspension.
//!
//! The grace wait is a durable suspension, not an in-memory sleep: the
//! workflow persists its record and registers a wake-up here. Production
//! deployments bind a durable external timer at this trait; the in-process
//! implementation below serves tests and single-process runs, where losing
//! the timer with the process is acceptable because a restart re-registers
//! on resume.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::record::WorkflowId;

/// Errors surfaced while registering a wake-up.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The scheduling backend refused or failed.
    #[error("failed to schedule resume: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// Registers a future wake-up for a suspended workflow.
#[async_trait]
pub trait ResumeScheduler: Send + Sync {
    /// Asks for `workflow_id` to be resumed at (or shortly after)
    /// `resume_at`.
    async fn schedule(
        &self,
        workflow_id: WorkflowId,
        resume_at: DateTime<Utc>,
    ) -> Result<(), ScheduleError>;
}

/// In-process [`ResumeScheduler`] backed by tokio timers.
///
/// Due workflow ids arrive on the receiver handed out by
/// [`TokioResumeScheduler::channel`]; the driver loop consumes them and
/// calls `resume`.
pub struct TokioResumeScheduler {
    due: mpsc::UnboundedSender<WorkflowId>,
    shutdown: CancellationToken,
}

impl TokioResumeScheduler {
    /// Creates a scheduler and the receiver its due ids arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowId>) {
        let (due, receiver) = mpsc::unbounded_channel();
        (
            Self {
                due,
                shutdown: CancellationToken::new(),
            },
            receiver,
        )
    }

    /// Token that stops all outstanding timers when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[async_trait]
impl ResumeScheduler for TokioResumeScheduler {
    async fn schedule(
        &self,
        workflow_id: WorkflowId,
        resume_at: DateTime<Utc>,
    ) -> Result<(), ScheduleError> {
        let delay = (resume_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        let due = self.due.clone();
        let shutdown = self.shutdown.clone();

        tracing::debug!(workflow_id = %workflow_id, delay_ms = delay.as_millis() as u64, "resume scheduled");
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    // Receiver gone means the driver shut down; nothing to do.
                    let _ = due.send(workflow_id);
                }
                () = shutdown.cancelled() => {}
            }
        });

        Ok(())
    }
}
