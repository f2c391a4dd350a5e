//! Task aggregate and lifecycle state machine.
//!
//! Pure data types with no I/O dependencies.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::progress::ProgressSample;
use crate::errors::VideoError;

/// Opaque identifier for a task.
///
/// Generated by the orchestrator at admission time. Every artifact written
/// for a task carries the `<id>_` prefix so it can be attributed back to it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The filename prefix (`<id>_`) used for every artifact of this task.
    #[must_use]
    pub fn file_prefix(&self) -> String {
        format!("{}_", self.0)
    }

    /// Whether a bare file name is attributed to this task.
    #[must_use]
    pub fn owns_file_name(&self, name: &str) -> bool {
        name.starts_with(&self.file_prefix())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for TaskId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// Lifecycle state of a task.
///
/// `pending → downloading → {completed | failed | cancelled}`. A pending task
/// may also be cancelled before a worker claims it. Terminal states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Admitted and waiting in the queue.
    Pending,
    /// Claimed by a worker.
    Downloading,
    /// Artifact resolved on disk.
    Completed,
    /// Unrecoverable error; see `Task::error`.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
}

impl TaskStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self → next` is an edge of the state machine.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Downloading | Self::Cancelled)
                | (
                    Self::Downloading,
                    Self::Completed | Self::Failed | Self::Cancelled
                )
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-initiated download and its tracked lifecycle.
///
/// Owned by the orchestrator's registry; callers only ever see clones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique, caller-opaque identifier.
    pub id: TaskId,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Percentage in `0..=100`, non-decreasing while downloading.
    pub progress: f64,
    /// Last reported transfer rate, e.g. `2.50MiB/s`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub speed: String,
    /// Last reported time remaining, e.g. `00:42`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub eta: String,
    /// Resolved artifact path, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Artifact size in bytes, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Error text, set only when failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Media title when a resolver reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-form annotations (byte counts, source, caveats).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Admission time.
    pub created: DateTime<Utc>,
    /// Last mutation time.
    pub updated: DateTime<Utc>,
}

impl Task {
    /// Create a task in `pending`.
    #[must_use]
    pub fn new(id: TaskId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0.0,
            speed: String::new(),
            eta: String::new(),
            file: None,
            size: None,
            error: None,
            title: None,
            metadata: BTreeMap::new(),
            created: now,
            updated: now,
        }
    }

    /// Move to `next`, rejecting edges that are not in the state machine.
    pub fn transition_to(&mut self, next: TaskStatus) -> Result<(), VideoError> {
        if !self.status.can_transition_to(next) {
            return Err(VideoError::InvalidTransition {
                id: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Fold a parsed progress sample into the task.
    ///
    /// Ignored unless downloading. The percentage never moves backwards, so a
    /// second stream (separate audio) restarting at 0% does not regress it.
    pub fn apply_progress(&mut self, sample: &ProgressSample) {
        if self.status != TaskStatus::Downloading {
            return;
        }
        let percent = sample.percent.clamp(0.0, 100.0);
        if percent > self.progress {
            self.progress = percent;
        }
        if !sample.speed.is_empty() {
            self.speed.clone_from(&sample.speed);
        }
        if !sample.eta.is_empty() {
            self.eta.clone_from(&sample.eta);
        }
        if let Some(downloaded) = &sample.downloaded {
            self.metadata
                .insert("downloaded".to_string(), downloaded.clone());
        }
        if let Some(total) = &sample.total_size {
            self.metadata.insert("total_size".to_string(), total.clone());
        }
        self.touch();
    }

    /// Mark completed with the resolved artifact.
    pub fn complete(&mut self, file: PathBuf, size: Option<u64>) -> Result<(), VideoError> {
        self.transition_to(TaskStatus::Completed)?;
        self.progress = 100.0;
        self.file = Some(file);
        self.size = size;
        Ok(())
    }

    /// Mark failed, retaining the error text.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), VideoError> {
        self.transition_to(TaskStatus::Failed)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// Mark cancelled. Returns `false` when the task was already cancelled.
    pub fn cancel(&mut self) -> Result<bool, VideoError> {
        if self.status == TaskStatus::Cancelled {
            return Ok(false);
        }
        self.transition_to(TaskStatus::Cancelled)?;
        Ok(true)
    }

    /// Bump the last-update timestamp.
    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }
}
