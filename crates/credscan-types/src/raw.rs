use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flat key/value output of the recognition engine, before it is folded into
/// a [`crate::CredentialRecord`].
///
/// Keys follow the wire names in [`crate::wire::keys`]; unknown keys are kept
/// but ignored when the record is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawFields(BTreeMap<String, String>);

impl RawFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`RawFields::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Value for `key`, or the empty string when absent.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when there are no entries or every value is blank.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.trim().is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build from a JSON object, stringifying scalar values.
    ///
    /// Nested objects are flattened one level with the parent key as a
    /// camel-case prefix (`{"mrz": {"name": ..}}` becomes `mrzName`), so
    /// engines that group the machine-readable zone still line up with the
    /// wire names. Arrays and nulls are skipped.
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut raw = Self::new();
        for (key, value) in object {
            match value {
                serde_json::Value::Object(inner) => {
                    for (inner_key, inner_value) in inner {
                        if let Some(text) = scalar_text(inner_value) {
                            raw.insert(prefixed_key(key, inner_key), text);
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        raw.insert(key.clone(), text);
                    }
                }
            }
        }
        raw
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn prefixed_key(prefix: &str, key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!("{prefix}{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => prefix.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_values_count_as_empty() {
        let raw: RawFields = [("fullName", "  "), ("curp", "")].into_iter().collect();
        assert!(raw.is_empty());
        assert!(!raw.clone().with("sex", "H").is_empty());
    }

    #[test]
    fn json_object_nested_mrz_is_flattened() {
        let value = json!({
            "fullName": "JUAN",
            "sectionNumber": 1234,
            "mrz": { "content": "IDMEX1", "documentNumber": "123" },
            "ignored": null,
        });
        let raw = RawFields::from_json_object(value.as_object().expect("object"));
        assert_eq!(raw.get("fullName"), "JUAN");
        assert_eq!(raw.get("sectionNumber"), "1234");
        assert_eq!(raw.get("mrzContent"), "IDMEX1");
        assert_eq!(raw.get("mrzDocumentNumber"), "123");
        assert_eq!(raw.get("ignored"), "");
    }
}
