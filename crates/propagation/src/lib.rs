#![forbid(unsafe_code)]

//! # Keyrelay Propagation
//!
//! Declarative credential propagation: resolve value-sets from pluggable
//! sources, map them through field-to-field rules, and publish them to
//! pluggable destinations.
//!
//! The pipeline is driven by a [`PropagationPlan`] — an immutable, validated
//! document of `(source, destination, mapping)` triples loaded once per
//! invocation. The [`PropagationRunner`] executes each pair in isolation and
//! aggregates structured, secret-free outcomes into a [`RunReport`].
//!
//! Sources and destinations are closed tagged variants dispatched by a
//! `type` discriminator; the systems behind them (role assumption, the
//! secret store, the CI API) are trait seams, so the pipeline tests against
//! fakes and deploys against real services.

/// Destination specs, the CI API seam, and the publisher.
pub mod destination;
/// Error types for every pipeline stage.
pub mod error;
/// The concrete HTTP CI client (feature `ci-http`).
#[cfg(feature = "ci-http")]
pub mod http;
/// The mapping engine.
pub mod mapping;
/// The propagation plan and its JSON document format.
pub mod plan;
/// Structured run results.
pub mod report;
/// The per-pair job runner.
pub mod runner;
/// Source specs and the resolver.
pub mod source;

pub use crate::destination::{
    CiApi, CiApiError, CiProjectConfig, DestinationPublisher, DestinationSpec, InMemoryCiApi,
    PublishReceipt,
};
pub use crate::error::{MappingError, PlanError, PublishError, ResolutionError};
#[cfg(feature = "ci-http")]
pub use crate::http::{CiHttpClient, CiHttpConfig};
pub use crate::mapping::{MappingEntry, MappingRule};
pub use crate::plan::{PropagationPlan, SourceBinding};
pub use crate::report::{FailureKind, PairOutcome, PairResult, RunReport, RunStatus};
pub use crate::runner::PropagationRunner;
pub use crate::source::{
    Environment, EnvironmentVariableConfig, SecretStoreConfig, SessionBroker,
    SessionCredentialConfig, SessionCredentials, SourceResolver, SourceSpec, StaticSessionBroker,
};
