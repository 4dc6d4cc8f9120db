//! Asynchronous orchestration of identity-credential extraction.
//!
//! An [`Orchestrator`] accepts image submissions, runs each one through the
//! fixed extraction pipeline on a blocking worker, and reports progress and a
//! single terminal outcome to a caller-supplied [`ExtractionCallback`].
//! Recognition itself is delegated to a [`RecognitionEngine`].

pub mod config;
pub mod engine;
mod runtime;
pub mod validation;

pub use config::OrchestratorConfig;
pub use engine::{EngineError, RecognitionEngine};
pub use runtime::dispatcher::{ExtractionCallback, TaskEvent};
pub use runtime::orchestrator::Orchestrator;
pub use runtime::types::{RuntimeError, TaskId, TaskStatus};
pub use validation::ValidationPolicy;

pub use credscan_types as types;
