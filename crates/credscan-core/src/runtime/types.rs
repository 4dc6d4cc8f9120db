use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;
use uuid::Uuid;

/// Opaque identity of a submitted extraction task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Lifecycle state of a task managed by the [`Orchestrator`].
///
/// `Pending → Running → {Succeeded, Failed, Cancelled}`. Terminal tasks are
/// removed from the task table right after their outcome is dispatched, so
/// a status query for them reports [`TaskStatus::Unknown`].
///
/// [`Orchestrator`]: crate::Orchestrator
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, waiting for a worker.
    Pending,
    /// A worker is executing the pipeline.
    Running,
    Succeeded,
    Failed,
    Cancelled,
    /// The identity is not present in the task table.
    Unknown,
}

impl TaskStatus {
    /// Returns `true` for `Succeeded`, `Failed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Returns `true` while the task can still be cancelled.
    pub fn is_live(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

/// Errors produced by the orchestration layer itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A required argument was empty.
    #[error("argument '{name}' must not be empty")]
    InvalidArgument { name: &'static str },

    /// The orchestrator was created outside a tokio runtime.
    #[error("no tokio runtime available; create the orchestrator inside a runtime")]
    NotInitialized,

    /// The orchestrator has been shut down.
    #[error("orchestrator is shut down")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_live_states_are_disjoint() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Succeeded,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
            TaskStatus::Unknown,
        ] {
            assert!(!(status.is_terminal() && status.is_live()), "{status}");
        }
        assert!(!TaskStatus::Unknown.is_terminal());
        assert!(!TaskStatus::Unknown.is_live());
    }

    #[test]
    fn task_id_round_trips_through_text() {
        let id = TaskId::generate();
        assert_eq!(id.to_string().parse::<TaskId>().ok(), Some(id));
        assert!("not-a-task".parse::<TaskId>().is_err());
        assert_ne!(TaskId::generate(), id);
    }
}
