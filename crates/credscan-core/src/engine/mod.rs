//! Seam to the recognition engine that reads pixels.

pub mod native;

#[cfg(test)]
pub(crate) mod scripted;

use std::path::{Path, PathBuf};

use credscan_types::{DocumentSide, EngineInfo, ErrorKind, RawFields};
use thiserror::Error;

pub use native::NativeEngine;

/// An opaque recognizer for one face of a credential.
///
/// Implementations are shared across worker threads and may be called
/// concurrently for different images.
pub trait RecognitionEngine: Send + Sync {
    /// Read the fields printed on `side` of the credential in `image_path`.
    fn extract(&self, image_path: &Path, side: DocumentSide) -> Result<RawFields, EngineError>;

    /// Best-effort guess whether the image shows a usable credential side.
    /// Never authoritative; [`RecognitionEngine::extract`] decides.
    fn precheck(&self, _image_path: &Path, _side: DocumentSide) -> bool {
        true
    }

    fn engine_info(&self) -> EngineInfo;
}

#[derive(Debug, Error)]
/// All errors an engine can report
pub enum EngineError {
    #[error("image not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("invalid image: {message}")]
    InvalidImage { message: String },

    #[error("recognition failed: {message}")]
    ProcessingFailed { message: String },

    #[error("engine error: {message}")]
    Unknown { message: String },

    #[error("Failed to canonicalize engine library path: {}", path.display())]
    CanonicalizeLibraryPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load engine library at: {}", path.display())]
    LoadLibrary {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Engine library is missing symbol `{symbol}`")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

impl EngineError {
    /// Where this failure sits in the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::FileNotFound { .. } => ErrorKind::FileNotFound,
            EngineError::InvalidImage { .. } => ErrorKind::InvalidImage,
            EngineError::ProcessingFailed { .. } => ErrorKind::ProcessingFailed,
            EngineError::Unknown { .. }
            | EngineError::CanonicalizeLibraryPath { .. }
            | EngineError::LoadLibrary { .. }
            | EngineError::MissingSymbol { .. } => ErrorKind::Unknown,
        }
    }

    /// Rebuild an engine-reported failure from its wire kind and message.
    pub fn reported(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::FileNotFound => EngineError::FileNotFound {
                path: PathBuf::from(message),
            },
            ErrorKind::InvalidImage => EngineError::InvalidImage { message },
            ErrorKind::ProcessingFailed => EngineError::ProcessingFailed { message },
            ErrorKind::TaskCancelled | ErrorKind::Unknown => EngineError::Unknown { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_errors_keep_their_kind() {
        for kind in [
            ErrorKind::FileNotFound,
            ErrorKind::InvalidImage,
            ErrorKind::ProcessingFailed,
            ErrorKind::Unknown,
        ] {
            assert_eq!(EngineError::reported(kind, "x").kind(), kind);
        }
        assert_eq!(
            EngineError::reported(ErrorKind::TaskCancelled, "x").kind(),
            ErrorKind::Unknown
        );
    }
}
