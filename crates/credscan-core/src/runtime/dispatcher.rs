use std::sync::Arc;

use credscan_types::{CredentialRecord, ErrorKind};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::runtime::pipeline::PipelineOutcome;
use crate::runtime::types::TaskId;

/// Receiver of one asynchronous task's events.
///
/// For each task, `on_progress` is called zero or more times in checkpoint
/// order, followed by exactly one of `on_complete`, `on_error` or
/// `on_cancelled`. Calls run on the tokio runtime and should not block.
pub trait ExtractionCallback: Send + Sync {
    fn on_progress(&self, _task_id: TaskId, _percent: u8, _status: &str) {}

    fn on_complete(&self, task_id: TaskId, record: CredentialRecord);

    fn on_error(&self, task_id: TaskId, kind: ErrorKind, message: &str);

    fn on_cancelled(&self, task_id: TaskId);
}

/// An event routed to a task's callback.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Progress { percent: u8, status: String },
    Completed(Box<CredentialRecord>),
    Failed { kind: ErrorKind, message: String },
    Cancelled,
}

impl TaskEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskEvent::Progress { .. })
    }
}

impl From<PipelineOutcome> for TaskEvent {
    fn from(outcome: PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Succeeded(record) => TaskEvent::Completed(Box::new(record)),
            PipelineOutcome::Failed { kind, message } => TaskEvent::Failed { kind, message },
            PipelineOutcome::Cancelled => TaskEvent::Cancelled,
        }
    }
}

/// Routes task events to the callback registered for that task.
///
/// Every registered task gets its own delivery loop on the runtime, fed by
/// an unbounded channel, so events for one task are delivered in send order
/// and a slow callback never holds up another task. A terminal event removes
/// the route before it is queued; anything sent for that task afterwards is
/// dropped.
#[derive(Debug)]
pub struct ResultDispatcher {
    routes: DashMap<TaskId, mpsc::UnboundedSender<TaskEvent>>,
    runtime: Handle,
}

impl ResultDispatcher {
    pub fn new(runtime: Handle) -> Self {
        Self {
            routes: DashMap::new(),
            runtime,
        }
    }

    /// Start delivering `task_id`'s events to `callback`. Returns `false`
    /// if the task already has a route.
    pub fn register(&self, task_id: TaskId, callback: Arc<dyn ExtractionCallback>) -> bool {
        match self.routes.entry(task_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::unbounded_channel();
                slot.insert(tx);
                self.runtime.spawn(deliver(task_id, rx, callback));
                true
            }
        }
    }

    /// Queue `event` for `task_id`. Returns `false` when the event was
    /// dropped because the task has no route (never registered, or its
    /// terminal event was already dispatched).
    pub fn dispatch(&self, task_id: TaskId, event: TaskEvent) -> bool {
        let tx = if event.is_terminal() {
            self.routes.remove(&task_id).map(|(_, tx)| tx)
        } else {
            self.routes.get(&task_id).map(|route| route.value().clone())
        };

        let Some(tx) = tx else {
            debug!(%task_id, ?event, "no route for task; event dropped");
            return false;
        };
        tx.send(event).is_ok()
    }

    /// Drop `task_id`'s route without delivering anything.
    pub fn unregister(&self, task_id: TaskId) -> bool {
        self.routes.remove(&task_id).is_some()
    }

    pub fn is_registered(&self, task_id: TaskId) -> bool {
        self.routes.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }
}

async fn deliver(
    task_id: TaskId,
    mut rx: mpsc::UnboundedReceiver<TaskEvent>,
    callback: Arc<dyn ExtractionCallback>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            TaskEvent::Progress { percent, status } => {
                callback.on_progress(task_id, percent, &status);
            }
            TaskEvent::Completed(record) => {
                callback.on_complete(task_id, *record);
                break;
            }
            TaskEvent::Failed { kind, message } => {
                callback.on_error(task_id, kind, &message);
                break;
            }
            TaskEvent::Cancelled => {
                callback.on_cancelled(task_id);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use credscan_types::DocumentSide;

    use super::*;

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn entries(&self) -> Vec<String> {
            self.0.lock().expect("lock").clone()
        }

        fn push(&self, entry: String) {
            self.0.lock().expect("lock").push(entry);
        }
    }

    impl ExtractionCallback for Log {
        fn on_progress(&self, _task_id: TaskId, percent: u8, _status: &str) {
            self.push(format!("progress {percent}"));
        }

        fn on_complete(&self, _task_id: TaskId, _record: CredentialRecord) {
            self.push("complete".into());
        }

        fn on_error(&self, _task_id: TaskId, kind: ErrorKind, _message: &str) {
            self.push(format!("error {kind}"));
        }

        fn on_cancelled(&self, _task_id: TaskId) {
            self.push("cancelled".into());
        }
    }

    async fn settle(log: &Log, expected: usize) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let entries = log.entries();
            if entries.len() >= expected || tokio::time::Instant::now() > deadline {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn events_arrive_in_order_and_terminal_is_final() {
        let dispatcher = ResultDispatcher::new(Handle::current());
        let log = Arc::new(Log::default());
        let task_id = TaskId::generate();
        assert!(dispatcher.register(task_id, log.clone()));

        for percent in [10, 30, 100] {
            assert!(dispatcher.dispatch(
                task_id,
                TaskEvent::Progress {
                    percent,
                    status: String::new()
                }
            ));
        }
        let record = CredentialRecord::new(DocumentSide::Front);
        assert!(dispatcher.dispatch(task_id, TaskEvent::Completed(Box::new(record))));
        assert!(!dispatcher.dispatch(task_id, TaskEvent::Cancelled));
        assert!(!dispatcher.dispatch(
            task_id,
            TaskEvent::Progress {
                percent: 50,
                status: String::new()
            }
        ));
        assert!(!dispatcher.is_registered(task_id));

        let entries = settle(&log, 4).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            entries,
            vec!["progress 10", "progress 30", "progress 100", "complete"]
        );
        assert_eq!(log.entries().len(), 4);
    }

    #[tokio::test]
    async fn unknown_task_events_are_dropped() {
        let dispatcher = ResultDispatcher::new(Handle::current());
        assert!(!dispatcher.dispatch(
            TaskId::generate(),
            TaskEvent::Failed {
                kind: ErrorKind::Unknown,
                message: "stray".into()
            }
        ));
        assert_eq!(dispatcher.len(), 0);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let dispatcher = ResultDispatcher::new(Handle::current());
        let task_id = TaskId::generate();
        assert!(dispatcher.register(task_id, Arc::new(Log::default())));
        assert!(!dispatcher.register(task_id, Arc::new(Log::default())));
        assert_eq!(dispatcher.len(), 1);
    }

    #[tokio::test]
    async fn unregistered_route_delivers_nothing() {
        let dispatcher = ResultDispatcher::new(Handle::current());
        let log = Arc::new(Log::default());
        let task_id = TaskId::generate();
        assert!(dispatcher.register(task_id, log.clone()));

        assert!(dispatcher.unregister(task_id));
        assert!(!dispatcher.unregister(task_id));
        assert!(!dispatcher.dispatch(task_id, TaskEvent::Cancelled));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(log.entries().is_empty());
        assert_eq!(dispatcher.len(), 0);
    }

    #[test]
    fn outcomes_map_to_terminal_events() {
        assert_eq!(TaskEvent::from(PipelineOutcome::Cancelled), TaskEvent::Cancelled);
        let event = TaskEvent::from(PipelineOutcome::Failed {
            kind: ErrorKind::FileNotFound,
            message: "gone".into(),
        });
        assert!(event.is_terminal());
        assert!(
            !TaskEvent::Progress {
                percent: 10,
                status: String::new()
            }
            .is_terminal()
        );
    }
}
