//! Destination specifications and the publisher that writes mapped
//! value-sets to them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keyrelay_credential::{SecretString, ValueSet};

use crate::error::PublishError;
use crate::source::{SourceResolver, SourceSpec};

/// A destination for mapped credential material, dispatched by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "configuration", rename_all = "snake_case")]
pub enum DestinationSpec {
    /// Project environment variables on a CI system.
    CiEnvironmentVariable(CiProjectConfig),
}

impl fmt::Display for DestinationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CiEnvironmentVariable(cfg) => {
                write!(f, "ci_environment_variable:{}", cfg.project_slug)
            }
        }
    }
}

/// Configuration for [`DestinationSpec::CiEnvironmentVariable`].
///
/// The write token is not embedded in the configuration: `token_source`
/// names a source the resolver fetches it from, so destinations recursively
/// depend on the source resolver for their own credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiProjectConfig {
    /// The target project (e.g. `gh/acme/app`).
    pub project_slug: String,

    /// Where the write token comes from.
    pub token_source: SourceSpec,

    /// Field of the resolved token value-set holding the token itself.
    #[serde(default = "default_token_field")]
    pub token_field: String,
}

fn default_token_field() -> String {
    "token".to_string()
}

/// Errors surfaced by a CI system's API.
#[derive(Debug, Error)]
pub enum CiApiError {
    /// The token was rejected.
    #[error("CI API rejected the token")]
    Unauthorized,

    /// The project slug is unknown.
    #[error("CI project not found: {project:?}")]
    ProjectNotFound {
        /// The unknown project.
        project: String,
    },

    /// The API could not be reached or answered unexpectedly.
    #[error("CI API transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
}

/// The CI system's environment-variable API.
///
/// One call writes one variable; writes are idempotent overwrites, which is
/// the conflict-resolution strategy for destinations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CiApi: Send + Sync {
    /// Sets `key` to `value` on the given project.
    async fn set_env_var(
        &self,
        token: &SecretString,
        project: &str,
        key: &str,
        value: &SecretString,
    ) -> Result<(), CiApiError>;
}

/// An in-memory [`CiApi`] that records writes. Useful in tests and dry
/// runs.
#[derive(Debug, Default)]
pub struct InMemoryCiApi {
    written: std::sync::Mutex<Vec<(String, String, String)>>,
}

impl InMemoryCiApi {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `(project, key, value)` triples written so far.
    pub fn written(&self) -> Vec<(String, String, String)> {
        self.written
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CiApi for InMemoryCiApi {
    async fn set_env_var(
        &self,
        _token: &SecretString,
        project: &str,
        key: &str,
        value: &SecretString,
    ) -> Result<(), CiApiError> {
        self.written
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((project.to_string(), key.to_string(), value.expose().to_string()));
        Ok(())
    }
}

/// Acknowledgement of a completed publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// The project written to.
    pub project: String,

    /// Keys written, in rule order.
    pub keys_written: Vec<String>,
}

/// Publishes mapped value-sets to destinations.
pub struct DestinationPublisher {
    api: Arc<dyn CiApi>,
    resolver: Arc<SourceResolver>,
}

impl DestinationPublisher {
    /// Creates a publisher over the given CI API, resolving destination
    /// tokens through `resolver`.
    pub fn new(api: Arc<dyn CiApi>, resolver: Arc<SourceResolver>) -> Self {
        Self { api, resolver }
    }

    /// Writes an already-mapped value-set to the destination.
    ///
    /// Every key is attempted unless an authorization or project-lookup
    /// failure makes further attempts pointless. A mix of written and
    /// unwritten keys surfaces as [`PublishError::Partial`], which callers
    /// treat as failure of the whole set — variables overwrite
    /// idempotently, so the retry unit is the whole pair.
    pub async fn publish(
        &self,
        spec: &DestinationSpec,
        mapped: &ValueSet,
    ) -> Result<PublishReceipt, PublishError> {
        match spec {
            DestinationSpec::CiEnvironmentVariable(cfg) => self.publish_ci(cfg, mapped).await,
        }
    }

    async fn publish_ci(
        &self,
        cfg: &CiProjectConfig,
        mapped: &ValueSet,
    ) -> Result<PublishReceipt, PublishError> {
        let token_values = self
            .resolver
            .resolve(&cfg.token_source)
            .await
            .map_err(|source| PublishError::TokenResolution { source })?;
        let token = token_values
            .get(&cfg.token_field)
            .cloned()
            .ok_or_else(|| PublishError::TokenField {
                field: cfg.token_field.clone(),
            })?;

        let mut written = Vec::new();
        let mut failed = Vec::new();
        let mut first_error: Option<CiApiError> = None;

        let mut entries = mapped.iter();
        for (key, value) in entries.by_ref() {
            match self
                .api
                .set_env_var(&token, &cfg.project_slug, key, value)
                .await
            {
                Ok(()) => written.push(key.to_string()),
                Err(err) => {
                    failed.push(key.to_string());
                    let fatal = matches!(
                        err,
                        CiApiError::Unauthorized | CiApiError::ProjectNotFound { .. }
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    if fatal {
                        break;
                    }
                }
            }
        }
        // Keys never attempted were not written either.
        failed.extend(entries.map(|(key, _)| key.to_string()));

        match first_error {
            None => {
                tracing::debug!(
                    project = %cfg.project_slug,
                    keys = written.len(),
                    "published mapped value-set"
                );
                Ok(PublishReceipt {
                    project: cfg.project_slug.clone(),
                    keys_written: written,
                })
            }
            Some(err) if written.is_empty() => Err(match err {
                CiApiError::Unauthorized => PublishError::Auth {
                    project: cfg.project_slug.clone(),
                },
                CiApiError::ProjectNotFound { project } => {
                    PublishError::ProjectNotFound { project }
                }
                CiApiError::Transport { message } => PublishError::Transport {
                    project: cfg.project_slug.clone(),
                    message,
                },
            }),
            Some(_) => Err(PublishError::Partial {
                project: cfg.project_slug.clone(),
                written,
                failed,
            }),
        }
    }
}
