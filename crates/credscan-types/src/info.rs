use serde::{Deserialize, Serialize};

use crate::record::{CredentialType, DocumentSide};

/// Self-description of the recognition engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
    pub capabilities: Vec<String>,
}

impl EngineInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }
}

/// Static capability descriptor returned by `get_service_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub service_name: String,
    pub version: String,
    pub supported_sides: Vec<DocumentSide>,
    pub supported_types: Vec<CredentialType>,
    pub capabilities: Vec<String>,
    pub max_image_bytes: u64,
    pub supported_formats: Vec<String>,
    pub engine: EngineInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_info_serializes_camel_case() {
        let info = ServiceInfo {
            service_name: "credscan".into(),
            version: "0.1.0".into(),
            supported_sides: vec![DocumentSide::Front, DocumentSide::Back],
            supported_types: vec![CredentialType::T2, CredentialType::T3],
            capabilities: vec!["mrz_extraction".into()],
            max_image_bytes: 10 * 1024 * 1024,
            supported_formats: vec!["jpg".into()],
            engine: EngineInfo::new("fake", "1"),
        };
        let value = serde_json::to_value(&info).expect("serialize");
        assert_eq!(value["supportedSides"], json!(["front", "back"]));
        assert_eq!(value["supportedTypes"], json!(["T2", "T3"]));
        assert_eq!(value["maxImageBytes"], json!(10_485_760));
        assert_eq!(value["engine"]["name"], json!("fake"));
    }

    #[test]
    fn engine_info_tolerates_missing_fields() {
        let info: EngineInfo = serde_json::from_str(r#"{"name":"native"}"#).expect("parse");
        assert_eq!(info.name, "native");
        assert!(info.version.is_empty());
        assert!(info.capabilities.is_empty());
    }
}
