use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering, fence};

use credscan_types::{
    CredentialRecord, CredentialType, DocumentSide, ErrorKind, ServiceInfo,
};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::{OrchestratorConfig, SERVICE_NAME};
use crate::engine::RecognitionEngine;
use crate::runtime::admission::Admission;
use crate::runtime::dispatcher::{ExtractionCallback, ResultDispatcher, TaskEvent};
use crate::runtime::pipeline::{
    ExtractionPipeline, ExtractionRequest, NoProgress, PipelineOutcome, ProgressSink,
};
use crate::runtime::storage::TaskTable;
use crate::runtime::types::{RuntimeError, TaskId, TaskStatus};

const CAPABILITIES: [&str; 5] = [
    "mrz_extraction",
    "front_data_extraction",
    "credential_type_detection",
    "t2_full_extraction",
    "t3_full_extraction",
];

/// The extraction service façade.
///
/// Asynchronous submissions each run the pipeline on their own blocking
/// worker, at most [`OrchestratorConfig::max_concurrent_tasks`] at a time;
/// the rest wait as `Pending`. Progress and the single terminal outcome
/// reach the caller through its [`ExtractionCallback`]. Synchronous
/// submissions run inline.
///
/// Dropping the orchestrator shuts it down, cancelling every live task.
///
/// # Usage
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::start(engine, OrchestratorConfig::from_env())?;
/// let task_id = orchestrator.submit_async("front.jpg", DocumentSide::Front, callback)?;
/// ```
pub struct Orchestrator {
    shared: Arc<Shared>,
}

struct Shared {
    tasks: TaskTable,
    dispatcher: ResultDispatcher,
    pipeline: ExtractionPipeline,
    admission: Admission,
    config: OrchestratorConfig,
    runtime: Handle,
    closed: AtomicBool,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("live_tasks", &self.shared.tasks.len())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Start an orchestrator on the current tokio runtime.
    pub fn start(
        engine: Arc<dyn RecognitionEngine>,
        config: OrchestratorConfig,
    ) -> Result<Self, RuntimeError> {
        let runtime = Handle::try_current().map_err(|_| RuntimeError::NotInitialized)?;
        Ok(Self::with_runtime(engine, config, runtime))
    }

    /// Start an orchestrator whose workers and callbacks run on `runtime`.
    pub fn with_runtime(
        engine: Arc<dyn RecognitionEngine>,
        config: OrchestratorConfig,
        runtime: Handle,
    ) -> Self {
        info!(
            max_concurrent_tasks = config.max_concurrent_tasks,
            max_image_bytes = config.max_image_bytes,
            strict = config.policy.strict,
            "orchestrator started"
        );
        let shared = Shared {
            tasks: TaskTable::new(),
            dispatcher: ResultDispatcher::new(runtime.clone()),
            pipeline: ExtractionPipeline::new(engine, config.clone()),
            admission: Admission::new(config.max_concurrent_tasks.max(1)),
            config,
            runtime,
            closed: AtomicBool::new(false),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Schedule an extraction and return immediately.
    ///
    /// The task starts `Pending` and waits for a free worker; there is no
    /// limit on how many tasks may wait. An empty path is refused with
    /// [`RuntimeError::InvalidArgument`] and no callback.
    ///
    /// After [`Orchestrator::shutdown`] the submission is refused with
    /// [`RuntimeError::Shutdown`] and `callback.on_error` is called once with
    /// [`ErrorKind::Unknown`]. The identity passed to that call is never
    /// tracked, so [`Orchestrator::get_status`] reports it as unknown. A
    /// submission racing with shutdown is either refused this way or
    /// accepted and then cancelled.
    pub fn submit_async(
        &self,
        image_path: impl Into<PathBuf>,
        side: DocumentSide,
        callback: Arc<dyn ExtractionCallback>,
    ) -> Result<TaskId, RuntimeError> {
        let image_path = image_path.into();
        if image_path.as_os_str().is_empty() {
            return Err(RuntimeError::InvalidArgument { name: "image_path" });
        }
        if self.is_shut_down() {
            let rejected = TaskId::generate();
            let err = RuntimeError::Shutdown;
            warn!(task_id = %rejected, error = %err, "submission rejected");
            callback.on_error(rejected, ErrorKind::Unknown, &err.to_string());
            return Err(err);
        }

        // Route first: a task visible in the table always has one.
        let (task_id, cancel_rx) = loop {
            let task_id = TaskId::generate();
            if !self.shared.dispatcher.register(task_id, Arc::clone(&callback)) {
                continue;
            }
            match self.shared.tasks.insert(task_id, image_path.clone(), side) {
                Some(cancel_rx) => break (task_id, cancel_rx),
                None => {
                    self.shared.dispatcher.unregister(task_id);
                }
            }
        };
        info!(%task_id, path = %image_path.display(), %side, "task submitted");

        // Pairs with the fence in `shutdown`: either shutdown sees this task
        // or this load sees `closed`.
        fence(Ordering::SeqCst);
        if self.is_shut_down() {
            self.shared.cancel(task_id);
            return Ok(task_id);
        }

        let request = ExtractionRequest { image_path, side };
        let shared = Arc::clone(&self.shared);
        self.shared
            .runtime
            .spawn(async move { shared.run_task(task_id, request, cancel_rx).await });

        Ok(task_id)
    }

    /// Run an extraction on the caller's thread and return its record.
    ///
    /// Never fails: problems are reported through `error_message` with
    /// `is_acceptable == false`. Blocks for the full extraction, so call it
    /// from a blocking context rather than directly on an async worker.
    pub fn submit_sync(&self, image_path: impl Into<PathBuf>, side: DocumentSide) -> CredentialRecord {
        let request = ExtractionRequest {
            image_path: image_path.into(),
            side,
        };
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let outcome = self.shared.pipeline.run(&request, &cancel_rx, &NoProgress);
        match &outcome {
            PipelineOutcome::Succeeded(record) => info!(
                path = %request.image_path.display(),
                %side,
                acceptable = record.is_acceptable,
                elapsed_ms = record.processing_time_ms,
                "synchronous extraction finished"
            ),
            PipelineOutcome::Failed { kind, message } => warn!(
                path = %request.image_path.display(),
                %side,
                %kind,
                error_message = %message,
                "synchronous extraction failed"
            ),
            PipelineOutcome::Cancelled => {}
        }
        outcome.into_record(side)
    }

    /// Cancel a live task. Returns `false` if it is unknown or already
    /// finished.
    ///
    /// The task's callback receives `on_cancelled` exactly once. An engine
    /// call already in flight keeps running, but its result is discarded.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        self.shared.cancel(task_id)
    }

    /// Current state, or [`TaskStatus::Unknown`] once the task has finished
    /// and been removed.
    pub fn get_status(&self, task_id: TaskId) -> TaskStatus {
        self.shared.tasks.status(task_id)
    }

    /// Last progress checkpoint of a live task.
    pub fn get_progress(&self, task_id: TaskId) -> Option<(u8, String)> {
        self.shared.tasks.progress(task_id)
    }

    pub fn get_service_info(&self) -> ServiceInfo {
        let config = &self.shared.config;
        ServiceInfo {
            service_name: SERVICE_NAME.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            supported_sides: vec![DocumentSide::Front, DocumentSide::Back],
            supported_types: vec![CredentialType::T2, CredentialType::T3],
            capabilities: CAPABILITIES.iter().map(|c| (*c).to_owned()).collect(),
            max_image_bytes: config.max_image_bytes,
            supported_formats: config.supported_formats.clone(),
            engine: self.shared.pipeline.engine().engine_info(),
        }
    }

    /// Best-effort check that the image shows a usable credential side.
    /// `false` for paths that are not existing files.
    pub fn check_credential(&self, image_path: impl Into<PathBuf>, side: DocumentSide) -> bool {
        let image_path = image_path.into();
        if !image_path.is_file() {
            debug!(path = %image_path.display(), "pre-check skipped; not a file");
            return false;
        }
        self.shared.pipeline.engine().precheck(&image_path, side)
    }

    /// Number of tasks not yet finished.
    pub fn live_tasks(&self) -> usize {
        self.shared.tasks.len()
    }

    #[cfg(test)]
    pub(crate) fn open_routes(&self) -> usize {
        self.shared.dispatcher.len()
    }

    /// Cancel every live task, queued or running, and refuse further
    /// asynchronous submissions. Idempotent.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        fence(Ordering::SeqCst);
        self.shared.admission.close();
        let cancelled = self
            .shared
            .tasks
            .ids()
            .into_iter()
            .filter(|task_id| self.shared.cancel(*task_id))
            .count();
        info!(cancelled, "orchestrator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    /// Wait for a worker slot, then run the pipeline on a blocking thread.
    async fn run_task(
        self: Arc<Self>,
        task_id: TaskId,
        request: ExtractionRequest,
        cancel_rx: watch::Receiver<bool>,
    ) {
        let permit = match self.admission.acquire().await {
            Ok(permit) => permit,
            Err(err) => {
                self.finish(
                    task_id,
                    PipelineOutcome::Failed {
                        kind: ErrorKind::Unknown,
                        message: err.to_string(),
                    },
                );
                return;
            }
        };
        if !self.tasks.mark_running(task_id) {
            debug!(%task_id, "task finished while waiting for a worker");
            return;
        }

        let worker_shared = Arc::clone(&self);
        let worker = self.runtime.spawn_blocking(move || {
            let _permit = permit;
            worker_shared.execute_task(task_id, &request, &cancel_rx);
        });
        if let Err(err) = worker.await {
            error!(%task_id, error = %err, "extraction worker aborted");
            self.finish(
                task_id,
                PipelineOutcome::Failed {
                    kind: ErrorKind::Unknown,
                    message: format!("extraction worker aborted: {err}"),
                },
            );
        }
    }

    /// Body of a blocking worker.
    fn execute_task(
        &self,
        task_id: TaskId,
        request: &ExtractionRequest,
        cancel_rx: &watch::Receiver<bool>,
    ) {
        let progress = TaskProgress {
            shared: self,
            task_id,
        };
        let outcome = self.pipeline.run(request, cancel_rx, &progress);
        self.finish(task_id, outcome);
    }

    /// Record a terminal outcome and dispatch it, unless the task already
    /// finished (typically through cancellation).
    fn finish(&self, task_id: TaskId, outcome: PipelineOutcome) {
        let Some(record) = self.tasks.finish(task_id, outcome.status()) else {
            debug!(%task_id, status = %outcome.status(), "task already finished; outcome dropped");
            return;
        };
        match &outcome {
            PipelineOutcome::Succeeded(result) => info!(
                %task_id,
                side = %record.side,
                acceptable = result.is_acceptable,
                elapsed_ms = result.processing_time_ms,
                "task succeeded"
            ),
            PipelineOutcome::Failed { kind, message } => error!(
                %task_id,
                path = %record.image_path.display(),
                %kind,
                error_message = %message,
                "task failed"
            ),
            PipelineOutcome::Cancelled => info!(%task_id, "task cancelled at stage boundary"),
        }
        self.dispatcher.dispatch(task_id, TaskEvent::from(outcome));
    }

    fn cancel(&self, task_id: TaskId) -> bool {
        let Some(record) = self.tasks.cancel(task_id) else {
            debug!(%task_id, "cancel: task unknown or already finished");
            return false;
        };
        info!(%task_id, path = %record.image_path.display(), "task cancelled");
        self.dispatcher.dispatch(task_id, TaskEvent::Cancelled);
        true
    }
}

/// Forwards checkpoints of one running task to its table entry and callback.
struct TaskProgress<'a> {
    shared: &'a Shared,
    task_id: TaskId,
}

impl ProgressSink for TaskProgress<'_> {
    fn checkpoint(&self, percent: u8, status: &str) {
        if !self.shared.tasks.record_progress(self.task_id, percent, status) {
            return;
        }
        debug!(task_id = %self.task_id, percent, status, "progress");
        self.shared.dispatcher.dispatch(
            self.task_id,
            TaskEvent::Progress {
                percent,
                status: status.to_owned(),
            },
        );
    }
}
