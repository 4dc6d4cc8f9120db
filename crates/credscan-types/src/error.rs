use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Failure taxonomy reported to callers through `on_error` and carried by
/// failed task outcomes.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The image path does not reference an existing file.
    FileNotFound,
    /// The file exists but is unreadable, too large or not a supported format.
    InvalidImage,
    /// The recognition engine failed or returned nothing usable.
    ProcessingFailed,
    /// The task was cancelled before producing a result.
    TaskCancelled,
    /// Anything not covered above.
    Unknown,
}

impl ErrorKind {
    /// Stable numeric code, shared with hosts that only understand integers.
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::FileNotFound => 1001,
            ErrorKind::InvalidImage => 1002,
            ErrorKind::ProcessingFailed => 1003,
            ErrorKind::TaskCancelled => 1004,
            ErrorKind::Unknown => 1999,
        }
    }

    /// Inverse of [`ErrorKind::code`]; unrecognised codes map to `Unknown`.
    pub const fn from_code(code: i32) -> Self {
        match code {
            1001 => ErrorKind::FileNotFound,
            1002 => ErrorKind::InvalidImage,
            1003 => ErrorKind::ProcessingFailed,
            1004 => ErrorKind::TaskCancelled,
            _ => ErrorKind::Unknown,
        }
    }
}

/// Error returned by the strict wire-text entry point.
///
/// Structured parsing through [`crate::CredentialRecord::from_wire`] never
/// fails; only malformed JSON text is reported here.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("wire payload is empty")]
    Empty,

    #[error("wire payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in [
            ErrorKind::FileNotFound,
            ErrorKind::InvalidImage,
            ErrorKind::ProcessingFailed,
            ErrorKind::TaskCancelled,
            ErrorKind::Unknown,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), kind);
        }
        assert_eq!(ErrorKind::from_code(42), ErrorKind::Unknown);
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(ErrorKind::FileNotFound.to_string(), "file_not_found");
        assert_eq!(
            "PROCESSING_FAILED".parse::<ErrorKind>().ok(),
            Some(ErrorKind::ProcessingFailed)
        );
    }
}
