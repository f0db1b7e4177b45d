//! Wire-level tests for the HTTP CI client.

#![cfg(feature = "ci-http")]

use std::time::Duration;

use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use keyrelay_credential::SecretString;
use keyrelay_propagation::{CiApi, CiApiError, CiHttpClient, CiHttpConfig};

async fn client_for(server: &MockServer) -> CiHttpClient {
    let base_url = Url::parse(&format!("{}/api/v2/", server.uri())).unwrap();
    CiHttpClient::new(CiHttpConfig {
        base_url,
        timeout: Duration::from_secs(2),
    })
    .unwrap()
}

#[tokio::test]
async fn posts_variable_with_token_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/project/gh/acme/app/envvar"))
        .and(header("Circle-Token", "circle-token"))
        .and(body_json(serde_json::json!({
            "name": "NPM_PASSWORD",
            "value": "v2"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .set_env_var(
            &SecretString::new("circle-token"),
            "gh/acme/app",
            "NPM_PASSWORD",
            &SecretString::new("v2"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_token_maps_to_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .set_env_var(
            &SecretString::new("expired"),
            "gh/acme/app",
            "KEY",
            &SecretString::new("v"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CiApiError::Unauthorized));
}

#[tokio::test]
async fn unknown_project_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .set_env_var(
            &SecretString::new("circle-token"),
            "gh/acme/gone",
            "KEY",
            &SecretString::new("v"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CiApiError::ProjectNotFound { project } if project == "gh/acme/gone"));
}

#[tokio::test]
async fn server_errors_map_to_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .set_env_var(
            &SecretString::new("circle-token"),
            "gh/acme/app",
            "KEY",
            &SecretString::new("v"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CiApiError::Transport { .. }));
}
