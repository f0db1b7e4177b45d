//! Structured results of a propagation run.
//!
//! The report is the exit surface of the pipeline: one entry per
//! source/destination pair plus an aggregate status, serializable to JSON,
//! and guaranteed free of secret material (key and field names only).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MappingError, PublishError, ResolutionError};

/// Aggregate status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every pair published.
    Success,
    /// Some pairs published, others failed.
    PartialFailure,
    /// No pair published.
    Failure,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::PartialFailure => write!(f, "partial_failure"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Coarse classification of a pair failure, aligned with the retry policy
/// each class gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Bad mapping or spec; fails fast, never retried.
    Configuration,
    /// Credential or permission problem; surfaced to the operator.
    Authorization,
    /// Referenced entity does not exist.
    NotFound,
    /// No `current` version mid-rotation; retried after a short delay.
    StaleRead,
    /// Transient store or network failure; retried with backoff.
    Transient,
    /// Some destination keys written, others not; the pair retries whole.
    PartialWrite,
    /// The destination could not be reached.
    Transport,
}

/// The result half of a pair outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PairResult {
    /// The mapped value-set was published.
    Published {
        /// Keys written, in rule order.
        keys: Vec<String>,
    },
    /// The pair failed; sibling pairs are unaffected.
    Failed {
        /// Failure classification.
        kind: FailureKind,
        /// Human-readable description, free of secret material.
        message: String,
    },
}

impl PairResult {
    /// Returns `true` for a published pair.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// Outcome of one source/destination pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairOutcome {
    /// Short description of the source (kind and principal identifier).
    pub source: String,

    /// The destination specifier.
    pub destination: String,

    /// What happened.
    #[serde(flatten)]
    pub result: PairResult,
}

/// Aggregated result of one propagation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    outcomes: Vec<PairOutcome>,
}

impl RunReport {
    /// Wraps per-pair outcomes.
    pub fn new(outcomes: Vec<PairOutcome>) -> Self {
        Self { outcomes }
    }

    /// The per-pair outcomes in plan order.
    pub fn outcomes(&self) -> &[PairOutcome] {
        &self.outcomes
    }

    /// Aggregate status. An empty run counts as success.
    pub fn status(&self) -> RunStatus {
        let total = self.outcomes.len();
        let succeeded = self
            .outcomes
            .iter()
            .filter(|o| o.result.is_success())
            .count();

        if succeeded == total {
            RunStatus::Success
        } else if succeeded == 0 {
            RunStatus::Failure
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Returns `true` if every pair published.
    pub fn is_success(&self) -> bool {
        self.status() == RunStatus::Success
    }

    /// Serializes the report for the exit surface.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Internal failure of one pair, classified for the report.
#[derive(Debug)]
pub(crate) struct PairFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<ResolutionError> for PairFailure {
    fn from(err: ResolutionError) -> Self {
        Self {
            kind: Self::resolution_kind(&err),
            message: err.to_string(),
        }
    }
}

impl From<MappingError> for PairFailure {
    fn from(err: MappingError) -> Self {
        Self {
            kind: FailureKind::Configuration,
            message: err.to_string(),
        }
    }
}

impl From<PublishError> for PairFailure {
    fn from(err: PublishError) -> Self {
        let kind = match &err {
            PublishError::Auth { .. } => FailureKind::Authorization,
            PublishError::ProjectNotFound { .. } => FailureKind::NotFound,
            PublishError::Partial { .. } => FailureKind::PartialWrite,
            PublishError::TokenResolution { source } => PairFailure::resolution_kind(source),
            PublishError::TokenField { .. } => FailureKind::Configuration,
            PublishError::Transport { .. } => FailureKind::Transport,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl PairFailure {
    /// Classifies a resolution failure without consuming the error.
    fn resolution_kind(err: &ResolutionError) -> FailureKind {
        match err {
            ResolutionError::Authorization { .. } | ResolutionError::SessionExpired { .. } => {
                FailureKind::Authorization
            }
            ResolutionError::MissingVariable { .. } | ResolutionError::NotFound { .. } => {
                FailureKind::NotFound
            }
            ResolutionError::StaleRead { .. } => FailureKind::StaleRead,
            ResolutionError::Store(store) if keyrelay_credential::Retryable::is_transient(store) => {
                FailureKind::Transient
            }
            ResolutionError::Store(_) => FailureKind::Transport,
        }
    }
}
