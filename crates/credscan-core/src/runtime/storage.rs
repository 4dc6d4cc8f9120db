use std::path::PathBuf;

use credscan_types::DocumentSide;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::runtime::types::{TaskId, TaskStatus};

/// The in-memory record for one live task.
#[derive(Debug)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub image_path: PathBuf,
    pub side: DocumentSide,
    pub status: TaskStatus,
    /// Last reported checkpoint, 0 to 100.
    pub progress: u8,
    pub status_text: String,
    /// Sending `true` asks the pipeline to stop at its next stage boundary.
    pub cancel_tx: watch::Sender<bool>,
}

/// Concurrent task table shared by submitters, workers and cancellers.
///
/// Only live (`Pending` or `Running`) tasks are held. Leaving the table is
/// the single point where a task becomes terminal: whichever caller removes
/// the entry owns the terminal dispatch, so concurrent finish and cancel
/// calls cannot both report an outcome.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: DashMap<TaskId, TaskRecord>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a `Pending` record under `task_id`. Returns the receiver the
    /// pipeline polls for cancellation, or `None` if the identity is already
    /// held by a live task.
    pub fn insert(
        &self,
        task_id: TaskId,
        image_path: PathBuf,
        side: DocumentSide,
    ) -> Option<watch::Receiver<bool>> {
        match self.tasks.entry(task_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let (cancel_tx, cancel_rx) = watch::channel(false);
                slot.insert(TaskRecord {
                    task_id,
                    image_path,
                    side,
                    status: TaskStatus::Pending,
                    progress: 0,
                    status_text: String::new(),
                    cancel_tx,
                });
                Some(cancel_rx)
            }
        }
    }

    /// `Pending → Running`. Returns `false` if the task is gone or already
    /// running.
    pub fn mark_running(&self, task_id: TaskId) -> bool {
        let Some(mut record) = self.tasks.get_mut(&task_id) else {
            return false;
        };
        if record.status != TaskStatus::Pending {
            return false;
        }
        record.status = TaskStatus::Running;
        true
    }

    /// Store a checkpoint. Returns `false` if the task is no longer live.
    pub fn record_progress(&self, task_id: TaskId, percent: u8, status_text: &str) -> bool {
        let Some(mut record) = self.tasks.get_mut(&task_id) else {
            return false;
        };
        record.progress = percent.min(100);
        record.status_text.clear();
        record.status_text.push_str(status_text);
        true
    }

    /// Remove a live task, stamping it with terminal `status`. `None` means
    /// another caller already finished it.
    pub fn finish(&self, task_id: TaskId, status: TaskStatus) -> Option<TaskRecord> {
        debug_assert!(status.is_terminal());
        self.tasks
            .remove_if(&task_id, |_, record| record.status.is_live())
            .map(|(_, mut record)| {
                record.status = status;
                record
            })
    }

    /// Remove a live task as `Cancelled` and signal its pipeline.
    pub fn cancel(&self, task_id: TaskId) -> Option<TaskRecord> {
        let record = self.finish(task_id, TaskStatus::Cancelled)?;
        record.cancel_tx.send_replace(true);
        Some(record)
    }

    pub fn status(&self, task_id: TaskId) -> TaskStatus {
        self.tasks
            .get(&task_id)
            .map(|record| record.status)
            .unwrap_or(TaskStatus::Unknown)
    }

    /// Last checkpoint as `(percent, status text)`.
    pub fn progress(&self, task_id: TaskId) -> Option<(u8, String)> {
        self.tasks
            .get(&task_id)
            .map(|record| (record.progress, record.status_text.clone()))
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
