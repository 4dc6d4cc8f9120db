//! Acceptance and classification rules over a populated [`CredentialRecord`].
//!
//! Everything here is a pure function of its input. Absent fields are held
//! as empty strings in the record, so "blank" covers both missing and
//! whitespace-only values.

use std::sync::LazyLock;

use credscan_types::{CredentialRecord, CredentialType, DocumentSide, FrontFields};
use regex::Regex;

const IDENTIFIER_LEN: usize = 18;

static CURP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{4}[0-9]{6}[HM][A-Z]{5}[0-9A-Z][0-9]$").expect("static regex")
});

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Name, CURP, voter key, birth date and sex must all be present.
pub fn validate_front(record: &CredentialRecord) -> bool {
    let front = &record.front;
    [
        &front.full_name,
        &front.curp,
        &front.voter_key,
        &front.birth_date,
        &front.sex,
    ]
    .iter()
    .all(|value| !is_blank(value))
}

/// Raw zone content, document number and name must all be present.
pub fn validate_back(record: &CredentialRecord) -> bool {
    let back = &record.back;
    [&back.mrz_content, &back.document_number, &back.name]
        .iter()
        .all(|value| !is_blank(value))
}

/// Dispatch on the record's side. A record without a side never validates.
pub fn validate(record: &CredentialRecord) -> bool {
    match record.document_side {
        Some(DocumentSide::Front) => validate_front(record),
        Some(DocumentSide::Back) => validate_back(record),
        None => false,
    }
}

/// Upper-case and drop everything that is not an ASCII letter or digit.
fn normalize_identifier(value: &str) -> String {
    value
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Structural CURP check: four letters, six digits, `H` or `M`, five
/// letters, one letter or digit, one digit.
pub fn curp_well_formed(curp: &str) -> bool {
    let normalized = normalize_identifier(curp);
    normalized.len() == IDENTIFIER_LEN && CURP_PATTERN.is_match(&normalized)
}

pub fn voter_key_well_formed(key: &str) -> bool {
    normalize_identifier(key).len() == IDENTIFIER_LEN
}

/// Number of non-blank regional fields (state, municipality, locality,
/// issue year).
pub fn regional_fields_present(front: &FrontFields) -> usize {
    front
        .regional()
        .into_iter()
        .filter(|value| !is_blank(value))
        .count()
}

/// `T2` when any regional field is present, otherwise `T3`.
///
/// Only meaningful for front-side records.
pub fn classify_type(record: &CredentialRecord) -> CredentialType {
    if regional_fields_present(&record.front) > 0 {
        CredentialType::T2
    } else {
        CredentialType::T3
    }
}

/// Acceptance rule applied after extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Also require a structurally valid CURP and voter key on front-side
    /// records.
    pub strict: bool,
}

impl ValidationPolicy {
    pub const fn strict() -> Self {
        Self { strict: true }
    }

    pub fn accepts(&self, record: &CredentialRecord) -> bool {
        if !validate(record) {
            return false;
        }
        match record.document_side {
            Some(DocumentSide::Front) if self.strict => {
                curp_well_formed(&record.front.curp)
                    && voter_key_well_formed(&record.front.voter_key)
            }
            _ => true,
        }
    }
}
