use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::raw::RawFields;
use crate::wire::keys;

/// Which face of the credential an image shows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSide {
    #[strum(to_string = "front", serialize = "frontal")]
    #[serde(alias = "frontal")]
    Front,
    #[strum(to_string = "back", serialize = "reverso")]
    #[serde(alias = "reverso")]
    Back,
}

/// Front-side layout variant. Only meaningful for front-side records.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum CredentialType {
    T2,
    T3,
    #[default]
    #[strum(to_string = "unknown")]
    #[serde(rename = "unknown")]
    Unknown,
}

/// Fields printed on the front of the credential.
///
/// `state`, `municipality`, `locality` and `issue_year` only exist on the T2
/// layout; they stay empty for T3 cards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontFields {
    pub full_name: String,
    pub address: String,
    pub voter_key: String,
    pub curp: String,
    pub registration_year: String,
    pub birth_date: String,
    pub sex: String,
    pub section: String,
    pub validity: String,
    pub state: String,
    pub municipality: String,
    pub locality: String,
    pub issue_year: String,
}

impl FrontFields {
    pub(crate) fn from_lookup(mut get: impl FnMut(&'static str) -> String) -> Self {
        Self {
            full_name: get(keys::FULL_NAME),
            address: get(keys::ADDRESS),
            voter_key: get(keys::VOTER_KEY),
            curp: get(keys::CURP),
            registration_year: get(keys::REGISTRATION_YEAR),
            birth_date: get(keys::BIRTH_DATE),
            sex: get(keys::SEX),
            section: get(keys::SECTION),
            validity: get(keys::VALIDITY),
            state: get(keys::STATE),
            municipality: get(keys::MUNICIPALITY),
            locality: get(keys::LOCALITY),
            issue_year: get(keys::ISSUE_YEAR),
        }
    }

    /// The four regional fields whose presence marks a T2 card.
    pub fn regional(&self) -> [&str; 4] {
        [
            &self.state,
            &self.municipality,
            &self.locality,
            &self.issue_year,
        ]
    }

    pub(crate) fn wire_entries(&self) -> [(&'static str, &str); 13] {
        [
            (keys::FULL_NAME, &self.full_name),
            (keys::ADDRESS, &self.address),
            (keys::VOTER_KEY, &self.voter_key),
            (keys::CURP, &self.curp),
            (keys::REGISTRATION_YEAR, &self.registration_year),
            (keys::BIRTH_DATE, &self.birth_date),
            (keys::SEX, &self.sex),
            (keys::SECTION, &self.section),
            (keys::VALIDITY, &self.validity),
            (keys::STATE, &self.state),
            (keys::MUNICIPALITY, &self.municipality),
            (keys::LOCALITY, &self.locality),
            (keys::ISSUE_YEAR, &self.issue_year),
        ]
    }
}

/// Machine-readable zone found on the back of the credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackFields {
    /// Raw zone text, all lines.
    pub mrz_content: String,
    pub document_number: String,
    pub nationality: String,
    pub birth_date: String,
    pub expiry_date: String,
    pub sex: String,
    pub name: String,
}

impl BackFields {
    pub(crate) fn from_lookup(mut get: impl FnMut(&'static str) -> String) -> Self {
        Self {
            mrz_content: get(keys::MRZ_CONTENT),
            document_number: get(keys::MRZ_DOCUMENT_NUMBER),
            nationality: get(keys::MRZ_NATIONALITY),
            birth_date: get(keys::MRZ_BIRTH_DATE),
            expiry_date: get(keys::MRZ_EXPIRY_DATE),
            sex: get(keys::MRZ_SEX),
            name: get(keys::MRZ_NAME),
        }
    }

    pub(crate) fn wire_entries(&self) -> [(&'static str, &str); 7] {
        [
            (keys::MRZ_CONTENT, &self.mrz_content),
            (keys::MRZ_DOCUMENT_NUMBER, &self.document_number),
            (keys::MRZ_NATIONALITY, &self.nationality),
            (keys::MRZ_BIRTH_DATE, &self.birth_date),
            (keys::MRZ_EXPIRY_DATE, &self.expiry_date),
            (keys::MRZ_SEX, &self.sex),
            (keys::MRZ_NAME, &self.name),
        ]
    }
}

/// Result of one extraction: the fields read from the image plus the
/// classification and acceptance decision.
///
/// Only the field group matching `document_side` is ever populated; the other
/// group stays empty and serializes as empty strings. A record without a side
/// comes from an error path and carries `error_message`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    pub document_side: Option<DocumentSide>,
    pub front: FrontFields,
    pub back: BackFields,
    pub credential_type: CredentialType,
    pub is_acceptable: bool,
    pub processing_time_ms: u64,
    pub error_message: Option<String>,
}

impl CredentialRecord {
    /// An empty record for `side`.
    pub fn new(side: DocumentSide) -> Self {
        Self {
            document_side: Some(side),
            ..Self::default()
        }
    }

    /// Fold the engine's raw output into a record, reading only the group
    /// that belongs to `side`.
    pub fn from_raw(side: DocumentSide, raw: &RawFields) -> Self {
        let mut record = Self::new(side);
        match side {
            DocumentSide::Front => {
                record.front = FrontFields::from_lookup(|key| raw.get(key).to_owned());
            }
            DocumentSide::Back => {
                record.back = BackFields::from_lookup(|key| raw.get(key).to_owned());
            }
        }
        record
    }

    /// Error-path record: not acceptable, no fields, message set.
    pub fn failure(side: Option<DocumentSide>, message: impl Into<String>) -> Self {
        Self {
            document_side: side,
            is_acceptable: false,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Front fields, when this is a front-side record.
    pub fn front(&self) -> Option<&FrontFields> {
        match self.document_side {
            Some(DocumentSide::Front) => Some(&self.front),
            _ => None,
        }
    }

    /// Machine-readable zone, when this is a back-side record.
    pub fn back(&self) -> Option<&BackFields> {
        match self.document_side {
            Some(DocumentSide::Back) => Some(&self.back),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn with_processing_time(mut self, elapsed: Duration) -> Self {
        self.processing_time_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parses_aliases_case_insensitively() {
        assert_eq!("FRONT".parse::<DocumentSide>().ok(), Some(DocumentSide::Front));
        assert_eq!("frontal".parse::<DocumentSide>().ok(), Some(DocumentSide::Front));
        assert_eq!("Reverso".parse::<DocumentSide>().ok(), Some(DocumentSide::Back));
        assert!("middle".parse::<DocumentSide>().is_err());
        assert_eq!(DocumentSide::Back.to_string(), "back");
    }

    #[test]
    fn from_raw_populates_only_the_requested_side() {
        let raw: RawFields = [
            ("fullName", "JUAN PEREZ"),
            ("curp", "GALJ900101HDFRRN09"),
            ("mrzName", "PEREZ<<JUAN"),
            ("mrzContent", "IDMEX123"),
        ]
        .into_iter()
        .collect();

        let front = CredentialRecord::from_raw(DocumentSide::Front, &raw);
        assert_eq!(front.front.full_name, "JUAN PEREZ");
        assert_eq!(front.back, BackFields::default());
        assert!(front.back().is_none());

        let back = CredentialRecord::from_raw(DocumentSide::Back, &raw);
        assert_eq!(back.back.name, "PEREZ<<JUAN");
        assert_eq!(back.front, FrontFields::default());
        assert!(back.front().is_none());
    }

    #[test]
    fn failure_record_is_not_acceptable() {
        let record = CredentialRecord::failure(Some(DocumentSide::Front), "boom");
        assert!(!record.is_acceptable);
        assert!(record.is_error());
        assert_eq!(record.credential_type, CredentialType::Unknown);
    }

    #[test]
    fn processing_time_is_recorded_in_millis() {
        let record =
            CredentialRecord::new(DocumentSide::Back).with_processing_time(Duration::from_micros(2_500));
        assert_eq!(record.processing_time_ms, 2);
    }
}
