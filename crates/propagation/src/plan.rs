//! The declarative propagation plan and its JSON document format.
//!
//! A plan is loaded once per invocation into an immutable structure and
//! passed explicitly to the runner — no ambient configuration state. The
//! wire format is a document of `sources` (each binding a source to a
//! destination specifier through a mapping rule) and `destinations` (a
//! table keyed by specifier):
//!
//! ```json
//! {
//!   "sources": [
//!     {
//!       "type": "secret_store",
//!       "configuration": { "credential_id": "npm-login" },
//!       "destination": {
//!         "specifier": "ios-ci",
//!         "mapping_to_destination": [
//!           { "destination_key_name": "NPM_PASSWORD", "result_value_key": "password" }
//!         ]
//!       }
//!     }
//!   ],
//!   "destinations": {
//!     "ios-ci": {
//!       "type": "ci_environment_variable",
//!       "configuration": {
//!         "project_slug": "gh/acme/ios-app",
//!         "token_source": {
//!           "type": "secret_store",
//!           "configuration": { "credential_id": "ci-token" }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Omitting `result_value_key` means identity mapping. Decoding then
//! re-encoding an equivalent plan preserves all mapping semantics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::destination::DestinationSpec;
use crate::error::PlanError;
use crate::mapping::MappingRule;
use crate::source::SourceSpec;

/// A source bound to its destination specifier and mapping rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBinding {
    #[serde(flatten)]
    source: SourceSpec,
    destination: DestinationBinding,
}

/// The destination half of a source binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DestinationBinding {
    specifier: String,
    mapping_to_destination: MappingRule,
}

impl SourceBinding {
    /// Binds a source to a destination specifier through a mapping rule.
    pub fn new(
        source: SourceSpec,
        specifier: impl Into<String>,
        mapping: MappingRule,
    ) -> Self {
        Self {
            source,
            destination: DestinationBinding {
                specifier: specifier.into(),
                mapping_to_destination: mapping,
            },
        }
    }

    /// The source to resolve.
    pub fn source(&self) -> &SourceSpec {
        &self.source
    }

    /// The destination specifier this source feeds.
    pub fn specifier(&self) -> &str {
        &self.destination.specifier
    }

    /// The mapping applied between resolution and publishing.
    pub fn mapping(&self) -> &MappingRule {
        &self.destination.mapping_to_destination
    }
}

/// An ordered, validated set of source/destination pairs.
///
/// Construction validates; the accessors expose read-only views. The two
/// underspecified corners of the format are both validation errors here
/// rather than guesses: a dangling destination specifier and two sources
/// writing the same destination key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationPlan {
    sources: Vec<SourceBinding>,
    destinations: IndexMap<String, DestinationSpec>,
}

impl PropagationPlan {
    /// Builds a plan from parts, validating it.
    pub fn new(
        sources: Vec<SourceBinding>,
        destinations: IndexMap<String, DestinationSpec>,
    ) -> Result<Self, PlanError> {
        let plan = Self {
            sources,
            destinations,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Decodes and validates a plan from its JSON document form.
    pub fn from_json(document: &str) -> Result<Self, PlanError> {
        let plan: Self = serde_json::from_str(document)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Encodes the plan back into its JSON document form.
    pub fn to_json(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The source bindings in plan order.
    pub fn sources(&self) -> &[SourceBinding] {
        &self.sources
    }

    /// Looks up a destination by specifier.
    pub fn destination(&self, specifier: &str) -> Option<&DestinationSpec> {
        self.destinations.get(specifier)
    }

    /// The destination table.
    pub fn destinations(&self) -> &IndexMap<String, DestinationSpec> {
        &self.destinations
    }

    /// Validates the plan: every specifier must resolve and every
    /// destination key may be written by exactly one rule entry.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut keys_per_destination: IndexMap<&str, HashSet<&str>> = IndexMap::new();

        for binding in &self.sources {
            let specifier = binding.specifier();

            if !self.destinations.contains_key(specifier) {
                return Err(PlanError::UnknownDestination {
                    specifier: specifier.to_string(),
                });
            }

            if let Some(key) = binding.mapping().duplicate_destination_key() {
                return Err(PlanError::DuplicateDestinationKey {
                    specifier: specifier.to_string(),
                    key: key.to_string(),
                });
            }

            let seen = keys_per_destination.entry(specifier).or_default();
            for key in binding.mapping().destination_keys() {
                if !seen.insert(key) {
                    return Err(PlanError::DuplicateDestinationKey {
                        specifier: specifier.to_string(),
                        key: key.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::CiProjectConfig;
    use crate::mapping::MappingEntry;
    use crate::source::{EnvironmentVariableConfig, SecretStoreConfig};
    use keyrelay_credential::CredentialId;
    use pretty_assertions::assert_eq;

    fn secret_source(id: &str) -> SourceSpec {
        SourceSpec::SecretStore(SecretStoreConfig {
            credential_id: CredentialId::new(id).unwrap(),
        })
    }

    fn env_source(name: &str) -> SourceSpec {
        SourceSpec::EnvironmentVariable(EnvironmentVariableConfig {
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

    fn destinations(pairs: &[(&str, &str)]) -> IndexMap<String, DestinationSpec> {
        pairs
            .iter()
            .map(|(specifier, project)| ((*specifier).to_string(), ci_destination(project)))
            .collect()
    }

    #[test]
    fn valid_plan_passes_validation() {
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
            destinations(&[("ios-ci", "gh/acme/ios-app")]),
        );
        assert!(plan.is_ok());
    }

    #[test]
    fn unknown_specifier_is_rejected() {
        let err = PropagationPlan::new(
            vec![SourceBinding::new(
                secret_source("npm-login"),
                "no-such-destination",
                MappingRule::new(vec![MappingEntry::identity("password")]),
            )],
            destinations(&[("ios-ci", "gh/acme/ios-app")]),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            PlanError::UnknownDestination { specifier } if specifier == "no-such-destination"
        ));
    }

    #[test]
    fn duplicate_key_within_one_rule_is_rejected() {
        let err = PropagationPlan::new(
            vec![SourceBinding::new(
                secret_source("npm-login"),
                "ios-ci",
                MappingRule::new(vec![
                    MappingEntry::identity("NPM_PASSWORD"),
                    MappingEntry::renamed("NPM_PASSWORD", "password"),
                ]),
            )],
            destinations(&[("ios-ci", "gh/acme/ios-app")]),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            PlanError::DuplicateDestinationKey { key, .. } if key == "NPM_PASSWORD"
        ));
    }

    #[test]
    fn two_sources_writing_one_key_at_one_destination_are_rejected() {
        let err = PropagationPlan::new(
            vec![
                SourceBinding::new(
                    secret_source("npm-login"),
                    "ios-ci",
                    MappingRule::new(vec![MappingEntry::renamed("TOKEN", "password")]),
                ),
                SourceBinding::new(
                    env_source("TOKEN"),
                    "ios-ci",
                    MappingRule::new(vec![MappingEntry::identity("TOKEN")]),
                ),
            ],
            destinations(&[("ios-ci", "gh/acme/ios-app")]),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            PlanError::DuplicateDestinationKey { specifier, key }
                if specifier == "ios-ci" && key == "TOKEN"
        ));
    }

    #[test]
    fn same_key_at_different_destinations_is_fine() {
        let plan = PropagationPlan::new(
            vec![
                SourceBinding::new(
                    secret_source("npm-login"),
                    "ios-ci",
                    MappingRule::new(vec![MappingEntry::renamed("TOKEN", "password")]),
                ),
                SourceBinding::new(
                    env_source("TOKEN"),
                    "android-ci",
                    MappingRule::new(vec![MappingEntry::identity("TOKEN")]),
                ),
            ],
            destinations(&[
                ("ios-ci", "gh/acme/ios-app"),
                ("android-ci", "gh/acme/android-app"),
            ]),
        );
        assert!(plan.is_ok());
    }

    #[test]
    fn document_roundtrip_preserves_mapping_semantics() {
        let document = r#"
        {
          "sources": [
            {
              "type": "secret_store",
              "configuration": { "credential_id": "npm-login" },
              "destination": {
                "specifier": "ios-ci",
                "mapping_to_destination": [
                  { "destination_key_name": "NPM_PASSWORD", "result_value_key": "password" },
                  { "destination_key_name": "NPM_USER" }
                ]
              }
            }
          ],
          "destinations": {
            "ios-ci": {
              "type": "ci_environment_variable",
              "configuration": {
                "project_slug": "gh/acme/ios-app",
                "token_source": {
                  "type": "secret_store",
                  "configuration": { "credential_id": "ci-token" }
                }
              }
            }
          }
        }"#;

        let plan = PropagationPlan::from_json(document).unwrap();
        let entries = plan.sources()[0].mapping().entries();
        assert_eq!(entries[0].source_field(), "password");
        // Omitted result_value_key means identity mapping.
        assert_eq!(entries[1].source_field(), "NPM_USER");
        assert_eq!(entries[1].result_value_key, None);

        let reencoded = plan.to_json().unwrap();
        let reparsed = PropagationPlan::from_json(&reencoded).unwrap();
        assert_eq!(reparsed, plan);
    }

    #[test]
    fn malformed_document_is_a_json_error() {
        let err = PropagationPlan::from_json("{ not json").unwrap_err();
        assert!(matches!(err, PlanError::Json(_)));
    }
}
