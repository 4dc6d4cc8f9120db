use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use credscan_types::{CredentialRecord, DocumentSide, ErrorKind};
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::engine::RecognitionEngine;
use crate::runtime::types::TaskStatus;
use crate::validation;

const VALIDATED: (u8, &str) = (10, "Validating image");
const EXTRACTING: (u8, &str) = (30, "Extracting fields");
const COMPLETE: (u8, &str) = (100, "Processing complete");

/// One image to run through the pipeline.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub image_path: PathBuf,
    pub side: DocumentSide,
}

/// Receives the pipeline's progress checkpoints, in order.
pub trait ProgressSink {
    fn checkpoint(&self, percent: u8, status: &str);
}

/// Sink for synchronous runs, which have nobody to notify.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn checkpoint(&self, _percent: u8, _status: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
enum Stage {
    InputValidation,
    PreCheck,
    Extraction,
    PostProcessing,
}

/// How a single pipeline run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Succeeded(CredentialRecord),
    Failed { kind: ErrorKind, message: String },
    Cancelled,
}

impl PipelineOutcome {
    fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        PipelineOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        match self {
            PipelineOutcome::Succeeded(_) => TaskStatus::Succeeded,
            PipelineOutcome::Failed { .. } => TaskStatus::Failed,
            PipelineOutcome::Cancelled => TaskStatus::Cancelled,
        }
    }

    /// Fold the outcome into a record, encoding failures in `error_message`.
    pub fn into_record(self, side: DocumentSide) -> CredentialRecord {
        match self {
            PipelineOutcome::Succeeded(record) => record,
            PipelineOutcome::Failed { message, .. } => {
                CredentialRecord::failure(Some(side), message)
            }
            PipelineOutcome::Cancelled => CredentialRecord::failure(Some(side), "task cancelled"),
        }
    }
}

/// The fixed extraction sequence: validate input, pre-check, extract,
/// post-process.
///
/// Runs synchronously on the calling thread. Cancellation is observed only
/// between stages; an engine call already in progress always runs to
/// completion and its result is discarded if cancellation arrived meanwhile.
pub struct ExtractionPipeline {
    engine: Arc<dyn RecognitionEngine>,
    config: OrchestratorConfig,
}

impl ExtractionPipeline {
    pub fn new(engine: Arc<dyn RecognitionEngine>, config: OrchestratorConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &dyn RecognitionEngine {
        self.engine.as_ref()
    }

    pub fn run(
        &self,
        request: &ExtractionRequest,
        cancel_rx: &watch::Receiver<bool>,
        progress: &dyn ProgressSink,
    ) -> PipelineOutcome {
        let started = Instant::now();
        let path = request.image_path.as_path();
        let side = request.side;

        if let Err(outcome) = self.validate_input(path) {
            debug!(stage = %Stage::InputValidation, path = %path.display(), "input rejected");
            return outcome;
        }
        progress.checkpoint(VALIDATED.0, VALIDATED.1);
        if cancelled(cancel_rx, Stage::PreCheck) {
            return PipelineOutcome::Cancelled;
        }

        if !self.engine.precheck(path, side) {
            warn!(
                path = %path.display(),
                %side,
                "pre-check found no usable credential content; extracting anyway"
            );
        }
        if cancelled(cancel_rx, Stage::Extraction) {
            return PipelineOutcome::Cancelled;
        }

        progress.checkpoint(EXTRACTING.0, EXTRACTING.1);
        if cancelled(cancel_rx, Stage::Extraction) {
            return PipelineOutcome::Cancelled;
        }
        let extracted = self.engine.extract(path, side);
        if cancelled(cancel_rx, Stage::PostProcessing) {
            info!(path = %path.display(), "discarding engine result of cancelled task");
            return PipelineOutcome::Cancelled;
        }

        let raw = match extracted {
            Ok(raw) if raw.is_empty() => {
                return PipelineOutcome::failed(
                    ErrorKind::ProcessingFailed,
                    "recognition engine returned no fields",
                );
            }
            Ok(raw) => raw,
            Err(e) => {
                return PipelineOutcome::failed(
                    ErrorKind::ProcessingFailed,
                    format!("extraction failed ({}): {e}", e.kind()),
                );
            }
        };

        let mut record = CredentialRecord::from_raw(side, &raw);
        if side == DocumentSide::Front {
            record.credential_type = validation::classify_type(&record);
            let regional = validation::regional_fields_present(&record.front);
            if regional > 0 && regional < 4 {
                debug!(
                    path = %path.display(),
                    regional,
                    "only some regional fields were read; classified as {}",
                    record.credential_type
                );
            }
        }
        record.is_acceptable = self.config.policy.accepts(&record);
        let record = record.with_processing_time(started.elapsed());

        progress.checkpoint(COMPLETE.0, COMPLETE.1);
        PipelineOutcome::Succeeded(record)
    }

    fn validate_input(&self, path: &Path) -> Result<(), PipelineOutcome> {
        if path.as_os_str().is_empty() {
            return Err(PipelineOutcome::failed(
                ErrorKind::FileNotFound,
                "image path is empty",
            ));
        }

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineOutcome::failed(
                    ErrorKind::FileNotFound,
                    format!("image file not found: {}", path.display()),
                ));
            }
            Err(e) => {
                return Err(PipelineOutcome::failed(
                    ErrorKind::InvalidImage,
                    format!("cannot inspect image {}: {e}", path.display()),
                ));
            }
        };

        if !metadata.is_file() {
            return Err(PipelineOutcome::failed(
                ErrorKind::InvalidImage,
                format!("not a regular file: {}", path.display()),
            ));
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if !self.config.supports_extension(extension) {
            return Err(PipelineOutcome::failed(
                ErrorKind::InvalidImage,
                format!(
                    "unsupported image format '{extension}'; expected one of {}",
                    self.config.supported_formats.join(", ")
                ),
            ));
        }

        if metadata.len() > self.config.max_image_bytes {
            return Err(PipelineOutcome::failed(
                ErrorKind::InvalidImage,
                format!(
                    "image is {} bytes; limit is {}",
                    metadata.len(),
                    self.config.max_image_bytes
                ),
            ));
        }

        File::open(path).map(drop).map_err(|e| {
            PipelineOutcome::failed(
                ErrorKind::InvalidImage,
                format!("image is not readable: {e}"),
            )
        })
    }
}

fn cancelled(cancel_rx: &watch::Receiver<bool>, before: Stage) -> bool {
    let cancelled = *cancel_rx.borrow();
    if cancelled {
        debug!(stage = %before, "cancellation observed");
    }
    cancelled
}
