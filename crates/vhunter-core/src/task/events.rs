use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Task, TaskId, TaskStatus};

/// Events fanned out to task observers.
///
/// Serialized with a `type` tag so live clients can dispatch on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Full visible state of one task after a change.
    Progress {
        id: TaskId,
        progress: f64,
        speed: String,
        eta: String,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        updated: DateTime<Utc>,
    },
    /// The task registry was emptied.
    Cleared { updated: DateTime<Utc> },
}

impl TaskEvent {
    /// Snapshot a task into a progress event.
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self::Progress {
            id: task.id.clone(),
            progress: task.progress,
            speed: task.speed.clone(),
            eta: task.eta.clone(),
            status: task.status,
            file: task.file.clone(),
            error: task.error.clone(),
            updated: task.updated,
        }
    }

    /// Id of the task this event concerns, if any.
    #[must_use]
    pub const fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::Progress { id, .. } => Some(id),
            Self::Cleared { .. } => None,
        }
    }

    /// Event type name for logging.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Cleared { .. } => "cleared",
        }
    }
}
