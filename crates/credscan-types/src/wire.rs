//! Flat key/value transport format for [`CredentialRecord`].
//!
//! Every key in [`keys`] is always written: domain fields as strings (empty
//! when unpopulated), `isAcceptable` as a boolean and `processingTimeMs` as a
//! non-negative integer. Parsing is lenient: unknown keys are ignored, missing
//! keys take their defaults, and values of the wrong shape are coerced or
//! dropped instead of failing the whole record.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::WireError;
use crate::record::{BackFields, CredentialRecord, CredentialType, DocumentSide, FrontFields};

pub mod keys {
    pub const FULL_NAME: &str = "fullName";
    pub const ADDRESS: &str = "address";
    pub const VOTER_KEY: &str = "voterKey";
    pub const CURP: &str = "curp";
    pub const REGISTRATION_YEAR: &str = "registrationYear";
    pub const BIRTH_DATE: &str = "birthDate";
    pub const SEX: &str = "sex";
    pub const SECTION: &str = "section";
    pub const VALIDITY: &str = "validity";
    pub const STATE: &str = "state";
    pub const MUNICIPALITY: &str = "municipality";
    pub const LOCALITY: &str = "locality";
    pub const ISSUE_YEAR: &str = "issueYear";

    pub const MRZ_CONTENT: &str = "mrzContent";
    pub const MRZ_DOCUMENT_NUMBER: &str = "mrzDocumentNumber";
    pub const MRZ_NATIONALITY: &str = "mrzNationality";
    pub const MRZ_BIRTH_DATE: &str = "mrzBirthDate";
    pub const MRZ_EXPIRY_DATE: &str = "mrzExpiryDate";
    pub const MRZ_SEX: &str = "mrzSex";
    pub const MRZ_NAME: &str = "mrzName";

    pub const DOCUMENT_SIDE: &str = "documentSide";
    pub const CREDENTIAL_TYPE: &str = "credentialType";
    pub const IS_ACCEPTABLE: &str = "isAcceptable";
    pub const PROCESSING_TIME_MS: &str = "processingTimeMs";
    pub const ERROR_MESSAGE: &str = "errorMessage";
}

/// Number of keys in a serialized record.
pub const WIRE_KEY_COUNT: usize = 25;

impl CredentialRecord {
    fn wire_entries(&self) -> Vec<(&'static str, Value)> {
        let mut entries = Vec::with_capacity(WIRE_KEY_COUNT);
        for (key, value) in self.front.wire_entries() {
            entries.push((key, Value::from(value)));
        }
        for (key, value) in self.back.wire_entries() {
            entries.push((key, Value::from(value)));
        }
        let side = self.document_side.map(<&'static str>::from).unwrap_or("");
        entries.push((keys::DOCUMENT_SIDE, Value::from(side)));
        entries.push((
            keys::CREDENTIAL_TYPE,
            Value::from(credential_type_to_wire(self.credential_type)),
        ));
        entries.push((keys::IS_ACCEPTABLE, Value::from(self.is_acceptable)));
        entries.push((keys::PROCESSING_TIME_MS, Value::from(self.processing_time_ms)));
        entries.push((
            keys::ERROR_MESSAGE,
            Value::from(self.error_message.as_deref().unwrap_or("")),
        ));
        entries
    }

    /// Serialize into the flat key/value map.
    pub fn to_wire(&self) -> Map<String, Value> {
        self.wire_entries()
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect()
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.to_wire()).to_string()
    }

    /// Lenient parse. Anything that is not an object yields an empty record.
    pub fn from_wire(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        let document_side = lenient_string(map.get(keys::DOCUMENT_SIDE))
            .trim()
            .parse::<DocumentSide>()
            .ok();

        let mut record = Self {
            document_side,
            credential_type: credential_type_from_wire(&lenient_string(
                map.get(keys::CREDENTIAL_TYPE),
            )),
            is_acceptable: lenient_bool(map.get(keys::IS_ACCEPTABLE)),
            processing_time_ms: lenient_u64(map.get(keys::PROCESSING_TIME_MS)),
            error_message: Some(lenient_string(map.get(keys::ERROR_MESSAGE)))
                .filter(|m| !m.is_empty()),
            ..Self::default()
        };

        match document_side {
            Some(DocumentSide::Front) => {
                record.front = FrontFields::from_lookup(|key| lenient_string(map.get(key)));
            }
            Some(DocumentSide::Back) => {
                record.back = BackFields::from_lookup(|key| lenient_string(map.get(key)));
            }
            None => {}
        }
        record
    }

    /// Strict text entry point: fails only when the text is empty or not JSON.
    pub fn parse_json_str(text: &str) -> Result<Self, WireError> {
        if text.trim().is_empty() {
            return Err(WireError::Empty);
        }
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_wire(&value))
    }

    /// Like [`CredentialRecord::parse_json_str`], but a parse failure becomes
    /// an error record instead of an `Err`.
    pub fn from_json_str(text: &str) -> Self {
        Self::parse_json_str(text).unwrap_or_else(|e| Self::failure(None, e.to_string()))
    }
}

impl Serialize for CredentialRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.wire_entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in &entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CredentialRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_wire(&value))
    }
}

fn credential_type_to_wire(kind: CredentialType) -> &'static str {
    match kind {
        CredentialType::T2 => "T2",
        CredentialType::T3 => "T3",
        CredentialType::Unknown => "",
    }
}

fn credential_type_from_wire(text: &str) -> CredentialType {
    text.trim().parse().unwrap_or_default()
}

/// Strings pass through; numbers and booleans are stringified; anything else
/// is empty.
pub fn lenient_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub fn lenient_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true") || s == "1"
        }
        _ => false,
    }
}

pub fn lenient_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
