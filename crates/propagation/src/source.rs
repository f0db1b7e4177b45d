//! Source specifications and the resolver that turns them into value-sets.
//!
//! The variant set is closed on purpose: a `type` discriminator dispatches
//! into one of three backing systems, each carrying its own configuration
//! payload, and adding a system means adding a variant — no open-ended
//! dynamic dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use keyrelay_credential::{
    CredentialId, SecretStore, SecretString, StoreError, ValueSet, VersionLabel,
};

use crate::error::ResolutionError;

/// A source of credential material, dispatched by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "configuration", rename_all = "snake_case")]
pub enum SourceSpec {
    /// Temporary session material obtained by assuming a role.
    SessionCredential(SessionCredentialConfig),

    /// A single value read from the executing process's environment.
    EnvironmentVariable(EnvironmentVariableConfig),

    /// The `current`-labeled value-set of a credential in the secret store.
    SecretStore(SecretStoreConfig),
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionCredential(cfg) => write!(f, "session_credential:{}", cfg.role),
            Self::EnvironmentVariable(cfg) => write!(f, "environment_variable:{}", cfg.name),
            Self::SecretStore(cfg) => write!(f, "secret_store:{}", cfg.credential_id),
        }
    }
}

/// Configuration for [`SourceSpec::SessionCredential`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentialConfig {
    /// The role to assume.
    pub role: String,

    /// Session name recorded by the role-assumption API.
    pub session_name: String,
}

/// Configuration for [`SourceSpec::EnvironmentVariable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariableConfig {
    /// The environment variable to read. Doubles as the field name in the
    /// produced value-set.
    pub name: String,
}

/// Configuration for [`SourceSpec::SecretStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretStoreConfig {
    /// The credential whose `current` value-set is fetched.
    pub credential_id: CredentialId,
}

/// Temporary session material returned by the role-assumption API.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    /// The session's access key id.
    pub access_key_id: SecretString,

    /// The session's secret access key.
    pub secret_access_key: SecretString,

    /// The session token.
    pub session_token: SecretString,
}

impl SessionCredentials {
    /// Canonical value-set encoding of the session material.
    pub fn into_value_set(self) -> ValueSet {
        let mut values = ValueSet::new();
        values.insert("access_key_id", self.access_key_id);
        values.insert("secret_access_key", self.secret_access_key);
        values.insert("session_token", self.session_token);
        values
    }
}

/// The role-assumption API behind [`SourceSpec::SessionCredential`].
///
/// Implementations are expected to return
/// [`ResolutionError::Authorization`] when the caller lacks permission and
/// [`ResolutionError::SessionExpired`] when the session cannot be created.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionBroker: Send + Sync {
    /// Assumes `role` and returns temporary session material.
    async fn assume_role(
        &self,
        role: &str,
        session_name: &str,
    ) -> Result<SessionCredentials, ResolutionError>;
}

/// A broker that hands out preconfigured session material. Useful in tests
/// and single-process deployments where the session is provisioned outside
/// the pipeline.
#[derive(Debug, Clone)]
pub struct StaticSessionBroker {
    credentials: SessionCredentials,
}

impl StaticSessionBroker {
    /// Creates a broker returning the given material for every role.
    pub fn new(credentials: SessionCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl SessionBroker for StaticSessionBroker {
    async fn assume_role(
        &self,
        _role: &str,
        _session_name: &str,
    ) -> Result<SessionCredentials, ResolutionError> {
        Ok(self.credentials.clone())
    }
}

/// A snapshot of the process environment.
///
/// Captured once and passed explicitly, so resolution is deterministic and
/// tests never mutate the real process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment(HashMap<String, String>);

impl Environment {
    /// Captures the executing process's environment.
    pub fn from_process() -> Self {
        Self(std::env::vars().collect())
    }

    /// Builds a snapshot from explicit pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Looks up a variable by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Resolves a [`SourceSpec`] into a value-set.
pub struct SourceResolver {
    secrets: Arc<dyn SecretStore>,
    broker: Arc<dyn SessionBroker>,
    env: Environment,
}

impl SourceResolver {
    /// Creates a resolver over the given backing systems.
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        broker: Arc<dyn SessionBroker>,
        env: Environment,
    ) -> Self {
        Self {
            secrets,
            broker,
            env,
        }
    }

    /// Resolves a source into its value-set.
    pub async fn resolve(&self, spec: &SourceSpec) -> Result<ValueSet, ResolutionError> {
        match spec {
            SourceSpec::SessionCredential(cfg) => {
                let session = self.broker.assume_role(&cfg.role, &cfg.session_name).await?;
                tracing::debug!(role = %cfg.role, "assumed role session");
                Ok(session.into_value_set())
            }
            SourceSpec::EnvironmentVariable(cfg) => {
                let value =
                    self.env
                        .get(&cfg.name)
                        .ok_or_else(|| ResolutionError::MissingVariable {
                            name: cfg.name.clone(),
                        })?;
                let mut values = ValueSet::new();
                values.insert(cfg.name.clone(), SecretString::new(value));
                Ok(values)
            }
            SourceSpec::SecretStore(cfg) => {
                match self
                    .secrets
                    .get_labeled(&cfg.credential_id, VersionLabel::Current)
                    .await
                {
                    Ok(Some(version)) => Ok(version.values),
                    // A credential with no `current` label is mid-rotation;
                    // the caller retries after a short delay.
                    Ok(None) => Err(ResolutionError::StaleRead {
                        id: cfg.credential_id.clone(),
                    }),
                    Err(StoreError::NotFound { id }) => Err(ResolutionError::NotFound { id }),
                    Err(err) => Err(ResolutionError::Store(err)),
                }
            }
        }
    }
}
