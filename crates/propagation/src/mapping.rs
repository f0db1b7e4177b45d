//! Declarative field-to-field mapping between a resolved value-set and a
//! destination's expected key set.

use serde::{Deserialize, Serialize};

use keyrelay_credential::ValueSet;

use crate::error::MappingError;

/// One mapping entry: a destination key and, optionally, the source field it
/// is filled from. When `result_value_key` is omitted the destination key
/// itself is looked up in the value-set (identity mapping).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// The key written at the destination.
    pub destination_key_name: String,

    /// The source field to read, when it differs from the destination key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_value_key: Option<String>,
}

impl MappingEntry {
    /// Identity mapping: destination key doubles as the source field.
    pub fn identity(destination_key: impl Into<String>) -> Self {
        Self {
            destination_key_name: destination_key.into(),
            result_value_key: None,
        }
    }

    /// Renaming mapping: destination key filled from a different field.
    pub fn renamed(destination_key: impl Into<String>, source_field: impl Into<String>) -> Self {
        Self {
            destination_key_name: destination_key.into(),
            result_value_key: Some(source_field.into()),
        }
    }

    /// The field looked up in the resolved value-set.
    pub fn source_field(&self) -> &str {
        self.result_value_key
            .as_deref()
            .unwrap_or(&self.destination_key_name)
    }
}

/// An ordered sequence of mapping entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingRule(Vec<MappingEntry>);

impl MappingRule {
    /// Creates a rule from entries, preserving order.
    pub fn new(entries: Vec<MappingEntry>) -> Self {
        Self(entries)
    }

    /// The entries in order.
    pub fn entries(&self) -> &[MappingEntry] {
        &self.0
    }

    /// Returns `true` if the rule has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Destination keys in rule order.
    pub fn destination_keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.destination_key_name.as_str())
    }

    /// Returns the first destination key that appears more than once, if
    /// any. Checked at configuration-validation time, never at apply time.
    pub fn duplicate_destination_key(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.destination_keys().find(|key| !seen.insert(*key))
    }

    /// Applies the rule to a resolved value-set.
    ///
    /// Pure and deterministic: output preserves rule order, and a missing
    /// source field fails the whole application — no partial output.
    pub fn apply(&self, values: &ValueSet) -> Result<ValueSet, MappingError> {
        let mut mapped = ValueSet::new();
        for entry in &self.0 {
            let field = entry.source_field();
            let value = values
                .get(field)
                .ok_or_else(|| MappingError::UnresolvedField {
                    field: field.to_string(),
                })?;
            mapped.insert(entry.destination_key_name.clone(), value.clone());
        }
        Ok(mapped)
    }
}

impl FromIterator<MappingEntry> for MappingRule {
    fn from_iter<I: IntoIterator<Item = MappingEntry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
