//! Scenario tests for the propagation runner: pair isolation, aggregate
//! status, and the structured report.

use std::sync::Arc;
use std::time::Duration;

use keyrelay_credential::{
    CredentialId, InMemorySecretStore, RetryPolicy, RotationToken, SecretStore, SecretString,
};
use keyrelay_propagation::{
    CiProjectConfig, DestinationPublisher, DestinationSpec, Environment, FailureKind,
    InMemoryCiApi, MappingEntry, MappingRule, PlanError, PropagationPlan, PropagationRunner,
    RunStatus, SecretStoreConfig, SessionCredentials, SourceBinding, SourceResolver, SourceSpec,
    StaticSessionBroker,
};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        backoff_multiplier: 2.0,
        max_backoff: Duration::from_millis(5),
    }
}

fn secret_source(id: &str) -> SourceSpec {
    SourceSpec::SecretStore(SecretStoreConfig {
        credential_id: CredentialId::new(id).unwrap(),
    })
}

fn env_source(name: &str) -> SourceSpec {
    SourceSpec::EnvironmentVariable(keyrelay_propagation::EnvironmentVariableConfig {
        name: name.to_string(),
    })
}

fn ci_destination(project: &str) -> DestinationSpec {
    DestinationSpec::CiEnvironmentVariable(CiProjectConfig {
        project_slug: project.to_string(),
        token_source: secret_source("ci-token"),
        token_field: "token".to_string(),
    })
}

fn session_credentials() -> SessionCredentials {
    SessionCredentials {
        access_key_id: SecretString::new("AKIAEXAMPLE"),
        secret_access_key: SecretString::new("wJalrXUtnFEMI"),
        session_token: SecretString::new("FwoGZXIvYXdzEDICE"),
    }
}

struct Harness {
    secrets: Arc<InMemorySecretStore>,
    api: Arc<InMemoryCiApi>,
    runner: PropagationRunner,
}

async fn harness(env: Environment) -> Harness {
    let secrets = Arc::new(InMemorySecretStore::new());
    secrets
        .seed_current(
            &CredentialId::new("ci-token").unwrap(),
            [("token", "circle-token")].into_iter().collect(),
        )
        .await;

    let broker = Arc::new(StaticSessionBroker::new(session_credentials()));
    let resolver = Arc::new(SourceResolver::new(secrets.clone(), broker, env));
    let api = Arc::new(InMemoryCiApi::new());
    let publisher = DestinationPublisher::new(api.clone(), resolver.clone());
    let runner = PropagationRunner::new(resolver, publisher).with_stale_retry(fast_retry());

    Harness {
        secrets,
        api,
        runner,
    }
}

#[tokio::test]
async fn all_pairs_publishing_is_success() {
    let harness = harness(Environment::from_pairs([("REGISTRY_URL", "https://registry")])).await;
    harness
        .secrets
        .seed_current(
            &CredentialId::new("npm-login").unwrap(),
            [("password", "v2")].into_iter().collect(),
        )
        .await;

    let plan = PropagationPlan::new(
        vec![
            SourceBinding::new(
                secret_source("npm-login"),
                "ios-ci",
                MappingRule::new(vec![MappingEntry::renamed("NPM_PASSWORD", "password")]),
            ),
            SourceBinding::new(
                env_source("REGISTRY_URL"),
                "ios-ci",
                MappingRule::new(vec![MappingEntry::identity("REGISTRY_URL")]),
            ),
        ],
        [("ios-ci".to_string(), ci_destination("gh/acme/ios-app"))]
            .into_iter()
            .collect(),
    )
    .unwrap();

    let report = harness.runner.run(&plan).await.unwrap();
    assert_eq!(report.status(), RunStatus::Success);
    assert!(report.is_success());

    let written = harness.api.written();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].1, "NPM_PASSWORD");
    assert_eq!(written[0].2, "v2");
    assert_eq!(written[1].1, "REGISTRY_URL");
}

#[tokio::test]
async fn one_pair_failing_does_not_abort_siblings() {
    let harness = harness(Environment::default()).await;
    harness
        .secrets
        .seed_current(
            &CredentialId::new("npm-login").unwrap(),
            [("password", "v2")].into_iter().collect(),
        )
        .await;

    let plan = PropagationPlan::new(
        vec![
            // This pair fails: the environment variable is absent.
            SourceBinding::new(
                env_source("ABSENT_VAR"),
                "ios-ci",
                MappingRule::new(vec![MappingEntry::identity("ABSENT_VAR")]),
            ),
            SourceBinding::new(
                secret_source("npm-login"),
                "ios-ci",
                MappingRule::new(vec![MappingEntry::renamed("NPM_PASSWORD", "password")]),
            ),
        ],
        [("ios-ci".to_string(), ci_destination("gh/acme/ios-app"))]
            .into_iter()
            .collect(),
    )
    .unwrap();

    let report = harness.runner.run(&plan).await.unwrap();
    assert_eq!(report.status(), RunStatus::PartialFailure);

    let outcomes = report.outcomes();
    assert!(!outcomes[0].result.is_success());
    assert!(outcomes[1].result.is_success());

    // The healthy pair still reached the destination.
    let written = harness.api.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].1, "NPM_PASSWORD");
}

#[tokio::test]
async fn unresolved_mapping_field_fails_closed_as_configuration() {
    let harness = harness(Environment::default()).await;
    harness
        .secrets
        .seed_current(
            &CredentialId::new("npm-login").unwrap(),
            [("password", "v2")].into_iter().collect(),
        )
        .await;

    let plan = PropagationPlan::new(
        vec![SourceBinding::new(
            secret_source("npm-login"),
            "ios-ci",
            MappingRule::new(vec![MappingEntry::renamed("NPM_PASSWORD", "no_such_field")]),
        )],
        [("ios-ci".to_string(), ci_destination("gh/acme/ios-app"))]
            .into_iter()
            .collect(),
    )
    .unwrap();

    let report = harness.runner.run(&plan).await.unwrap();
    assert_eq!(report.status(), RunStatus::Failure);
    match &report.outcomes()[0].result {
        keyrelay_propagation::PairResult::Failed { kind, message } => {
            assert_eq!(*kind, FailureKind::Configuration);
            assert!(message.contains("no_such_field"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(harness.api.written().is_empty(), "no partial output reaches the destination");
}

#[tokio::test]
async fn mid_rotation_credential_reports_stale_read() {
    let harness = harness(Environment::default()).await;
    // A pending-only credential: rotation staged but never promoted.
    harness
        .secrets
        .put_pending(
            &CredentialId::new("mid-rotation").unwrap(),
            [("password", "v2")].into_iter().collect(),
            &RotationToken::generate(),
        )
        .await
        .unwrap();

    let plan = PropagationPlan::new(
        vec![SourceBinding::new(
            secret_source("mid-rotation"),
            "ios-ci",
            MappingRule::new(vec![MappingEntry::identity("password")]),
        )],
        [("ios-ci".to_string(), ci_destination("gh/acme/ios-app"))]
            .into_iter()
            .collect(),
    )
    .unwrap();

    let report = harness.runner.run(&plan).await.unwrap();
    assert_eq!(report.status(), RunStatus::Failure);
    match &report.outcomes()[0].result {
        keyrelay_propagation::PairResult::Failed { kind, .. } => {
            assert_eq!(*kind, FailureKind::StaleRead);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_plan_fails_the_whole_run() {
    let harness = harness(Environment::default()).await;

    // Bypass constructor validation via the document path with a dangling
    // specifier — run() must still refuse it.
    let document = serde_json::json!({
        "sources": [{
            "type": "environment_variable",
            "configuration": { "name": "X" },
            "destination": {
                "specifier": "nowhere",
                "mapping_to_destination": [ { "destination_key_name": "X" } ]
            }
        }],
        "destinations": {}
    });
    let plan: Result<PropagationPlan, _> =
        PropagationPlan::from_json(&document.to_string());
    assert!(matches!(plan, Err(PlanError::UnknownDestination { .. })));

    // A structurally valid plan still runs.
    let plan = PropagationPlan::new(
        vec![],
        [("ios-ci".to_string(), ci_destination("gh/acme/ios-app"))]
            .into_iter()
            .collect(),
    )
    .unwrap();
    let report = harness.runner.run(&plan).await.unwrap();
    assert_eq!(report.status(), RunStatus::Success);
}

#[tokio::test]
async fn report_json_is_secret_free() {
    let harness = harness(Environment::from_pairs([("TOKEN_VALUE", "super-secret")])).await;

    let plan = PropagationPlan::new(
        vec![SourceBinding::new(
            env_source("TOKEN_VALUE"),
            "ios-ci",
            MappingRule::new(vec![MappingEntry::identity("TOKEN_VALUE")]),
        )],
        [("ios-ci".to_string(), ci_destination("gh/acme/ios-app"))]
            .into_iter()
            .collect(),
    )
    .unwrap();

    let report = harness.runner.run(&plan).await.unwrap();
    let json = report.to_json().unwrap();
    assert!(json.contains("TOKEN_VALUE"));
    assert!(!json.contains("super-secret"));
}
