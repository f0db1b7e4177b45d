//! Named sets of secret values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::secret_string::SecretString;

/// An ordered mapping from field name to secret value.
///
/// Value-sets are what sources produce, mapping rules transform, and
/// destinations consume. Insertion order is preserved because mapped output
/// must follow rule order. Field names are plain metadata; only the values
/// are sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueSet(IndexMap<String, SecretString>);

impl ValueSet {
    /// Creates an empty value-set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing any existing value under the same name.
    pub fn insert(&mut self, field: impl Into<String>, value: SecretString) {
        self.0.insert(field.into(), value);
    }

    /// Looks up a field by name.
    pub fn get(&self, field: &str) -> Option<&SecretString> {
        self.0.get(field)
    }

    /// Returns `true` if the named field is present.
    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Number of fields in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretString)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<SecretString>> FromIterator<(K, V)> for ValueSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn preserves_insertion_order() {
        let set: ValueSet = [("b", "2"), ("a", "1"), ("c", "3")].into_iter().collect();
        let names: Vec<_> = set.field_names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn lookup_and_membership() {
        let set: ValueSet = [("token", "s3cret")].into_iter().collect();
        assert!(set.contains_field("token"));
        assert!(!set.contains_field("password"));
        assert_eq!(set.get("token").unwrap().expose(), "s3cret");
    }

    #[test]
    fn store_payload_roundtrip() {
        let set: ValueSet = [("access_key_id", "AKIA"), ("secret_access_key", "wJal")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&set).unwrap();
        let back: ValueSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn debug_output_redacts_values() {
        let set: ValueSet = [("token", "s3cret")].into_iter().collect();
        let debug = format!("{set:?}");
        assert!(debug.contains("token"));
        assert!(!debug.contains("s3cret"));
    }
}
