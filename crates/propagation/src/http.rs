//! Concrete CI destination client over HTTP.
//!
//! Implements [`CiApi`] against a CircleCI-compatible v2 API: one `POST
//! project/{slug}/envvar` per variable, authenticated with a token header.
//! Enabled by the `ci-http` feature.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use keyrelay_credential::SecretString;

use crate::destination::{CiApi, CiApiError};

/// Configuration for [`CiHttpClient`].
#[derive(Debug, Clone)]
pub struct CiHttpConfig {
    /// API base, ending in a slash (e.g. `https://circleci.com/api/v2/`).
    pub base_url: Url,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for CiHttpConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://circleci.com/api/v2/").expect("static base url parses"),
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP [`CiApi`] implementation.
pub struct CiHttpClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CiHttpClient {
    /// Builds a client from configuration.
    pub fn new(config: CiHttpConfig) -> Result<Self, CiApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| CiApiError::Transport {
                message: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }
}

#[async_trait]
impl CiApi for CiHttpClient {
    async fn set_env_var(
        &self,
        token: &SecretString,
        project: &str,
        key: &str,
        value: &SecretString,
    ) -> Result<(), CiApiError> {
        // Project slugs contain slashes (`gh/org/repo`); they are path
        // segments here, matching the upstream API shape.
        let url = self
            .base_url
            .join(&format!("project/{project}/envvar"))
            .map_err(|err| CiApiError::Transport {
                message: format!("invalid project slug {project:?}: {err}"),
            })?;

        let response = self
            .http
            .post(url)
            .header("Circle-Token", token.expose())
            .json(&serde_json::json!({ "name": key, "value": value.expose() }))
            .send()
            .await
            .map_err(|err| CiApiError::Transport {
                message: err.to_string(),
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CiApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(CiApiError::ProjectNotFound {
                project: project.to_string(),
            }),
            status => Err(CiApiError::Transport {
                message: format!("unexpected status {status}"),
            }),
        }
    }
}
