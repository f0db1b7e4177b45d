//! The top-level propagation job runner.

use std::sync::Arc;
use std::time::Duration;

use keyrelay_credential::{RetryPolicy, retry_with_backoff};

use crate::destination::{DestinationPublisher, DestinationSpec, PublishReceipt};
use crate::error::PlanError;
use crate::plan::{PropagationPlan, SourceBinding};
use crate::report::{FailureKind, PairFailure, PairOutcome, PairResult, RunReport};
use crate::source::SourceResolver;

/// Drives Source Resolver → Mapping Engine → Destination Publisher for each
/// pair of a validated plan.
///
/// Pair failures are isolated: one pair failing does not abort its
/// siblings. Plan-level configuration errors, by contrast, fail the whole
/// run before any pair starts.
pub struct PropagationRunner {
    resolver: Arc<SourceResolver>,
    publisher: DestinationPublisher,
    stale_retry: RetryPolicy,
}

impl PropagationRunner {
    /// Creates a runner. The default stale-read policy retries resolution a
    /// few times with short delays, matching the expected width of a
    /// mid-rotation window.
    pub fn new(resolver: Arc<SourceResolver>, publisher: DestinationPublisher) -> Self {
        Self {
            resolver,
            publisher,
            stale_retry: RetryPolicy {
                max_attempts: 4,
                initial_backoff: Duration::from_millis(250),
                backoff_multiplier: 2.0,
                max_backoff: Duration::from_secs(2),
            },
        }
    }

    /// Replaces the stale-read retry policy.
    pub fn with_stale_retry(mut self, policy: RetryPolicy) -> Self {
        self.stale_retry = policy;
        self
    }

    /// Runs every pair of the plan and aggregates the outcomes.
    pub async fn run(&self, plan: &PropagationPlan) -> Result<RunReport, PlanError> {
        plan.validate()?;

        let mut outcomes = Vec::with_capacity(plan.sources().len());
        for binding in plan.sources() {
            let source = binding.source().to_string();
            let destination = binding.specifier().to_string();

            let result = match plan.destination(binding.specifier()) {
                Some(spec) => self.run_pair(binding, spec).await,
                // Unreachable after validate(); fail the pair closed anyway.
                None => Err(PairFailure {
                    kind: FailureKind::Configuration,
                    message: format!("unknown destination specifier {destination:?}"),
                }),
            };

            let result = match result {
                Ok(receipt) => {
                    tracing::info!(
                        source = %source,
                        destination = %destination,
                        keys = receipt.keys_written.len(),
                        "pair published"
                    );
                    PairResult::Published {
                        keys: receipt.keys_written,
                    }
                }
                Err(failure) => {
                    tracing::warn!(
                        source = %source,
                        destination = %destination,
                        kind = ?failure.kind,
                        error = %failure.message,
                        "pair failed"
                    );
                    PairResult::Failed {
                        kind: failure.kind,
                        message: failure.message,
                    }
                }
            };

            outcomes.push(PairOutcome {
                source,
                destination,
                result,
            });
        }

        let report = RunReport::new(outcomes);
        tracing::info!(
            status = %report.status(),
            pairs = report.outcomes().len(),
            "propagation run finished"
        );
        Ok(report)
    }

    async fn run_pair(
        &self,
        binding: &SourceBinding,
        destination: &DestinationSpec,
    ) -> Result<PublishReceipt, PairFailure> {
        // Stale reads are expected while a rotation is mid-flight; give the
        // store a few short-delay chances before reporting.
        let values = retry_with_backoff(&self.stale_retry, "resolve_source", || async {
            self.resolver.resolve(binding.source()).await
        })
        .await?;

        let mapped = binding.mapping().apply(&values)?;
        let receipt = self.publisher.publish(destination, &mapped).await?;
        Ok(receipt)
    }
}
