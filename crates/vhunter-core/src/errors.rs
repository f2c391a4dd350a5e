//! Error taxonomy for video resolution and download.
//!
//! Serializable and free of non-`Clone` sources such as `std::io::Error`;
//! I/O failures are captured as kind + message strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::VideoDescriptor;
use crate::task::TaskStatus;

/// Errors produced anywhere in the download pipeline.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum VideoError {
    /// Missing or malformed request input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// URL scheme or host is not something we can fetch.
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// An external process exited unsuccessfully.
    #[error(
        "Command failed ({}): {command}\nstdout: {}\nstderr: {}",
        exit_label(.status),
        .stdout.trim(),
        .stderr.trim()
    )]
    ProcessFailed {
        /// Full command line, program and arguments.
        command: String,
        /// Exit code, `None` when killed by a signal.
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The host rejected the request for lack of a logged-in session.
    #[error("Login required: {0}")]
    LoginRequired(String),

    /// A required external tool could not be located or started.
    #[error("Tool unavailable: {tool} ({reason})")]
    ToolUnavailable { tool: String, reason: String },

    /// The tool succeeded but printed nothing.
    #[error("Empty output from {command}")]
    EmptyOutput { command: String },

    /// Structured output could not be decoded.
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// Every resolution strategy was exhausted.
    #[error("{message}")]
    Unresolved {
        message: String,
        /// Remediation-bearing descriptor to show the user.
        descriptor: Box<VideoDescriptor>,
    },

    /// No artifact could be attributed to the task.
    #[error("No downloaded file found for task {task_id} in {dir}")]
    ArtifactNotFound { task_id: String, dir: String },

    /// The only candidate artifact is too old to belong to this task.
    #[error("Newest file {path} is stale (modified {modified_secs_ago}s ago)")]
    StaleArtifact { path: String, modified_secs_ago: u64 },

    #[error("I/O error ({kind}): {message}")]
    Io { kind: String, message: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// The task was cancelled while in flight.
    #[error("Cancelled")]
    Cancelled,

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

fn exit_label(status: &Option<i32>) -> String {
    status.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit {c}"))
}

impl VideoError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn tool_unavailable(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolUnavailable {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn unresolved(message: impl Into<String>, descriptor: VideoDescriptor) -> Self {
        Self::Unresolved {
            message: message.into(),
            descriptor: Box::new(descriptor),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Capture a `std::io::Error` as kind + message.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        Self::Io {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }

    /// Like [`from_io_error`](Self::from_io_error) but prefixed with context.
    pub fn io_context(context: impl AsRef<str>, err: &std::io::Error) -> Self {
        Self::Io {
            kind: format!("{:?}", err.kind()),
            message: format!("{}: {err}", context.as_ref()),
        }
    }

    /// The remediation descriptor, when this error carries one.
    #[must_use]
    pub fn descriptor(&self) -> Option<&VideoDescriptor> {
        match self {
            Self::Unresolved { descriptor, .. } => Some(descriptor),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short message suitable for end users.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(m) => m.clone(),
            Self::UnsupportedUrl(url) => format!("This URL is not supported: {url}"),
            Self::ProcessFailed { .. } => "The downloader failed; see the logs for details".to_string(),
            Self::LoginRequired(_) => {
                "This video requires login. Provide a cookies file and try again".to_string()
            }
            Self::ToolUnavailable { tool, .. } => format!("{tool} is not installed or not executable"),
            Self::EmptyOutput { .. } | Self::Parse { .. } => {
                "Could not read video information".to_string()
            }
            Self::Unresolved { descriptor, message } => {
                if descriptor.special_note.is_empty() {
                    message.clone()
                } else {
                    descriptor.special_note.clone()
                }
            }
            Self::ArtifactNotFound { .. } | Self::StaleArtifact { .. } => {
                "The downloaded file could not be located".to_string()
            }
            Self::Io { message, .. } => format!("File system error: {message}"),
            Self::Network { message, .. } => format!("Network error: {message}"),
            Self::Cancelled => "Download cancelled".to_string(),
            Self::TaskNotFound(id) => format!("Task {id} not found"),
            Self::InvalidTransition { to, .. } => format!("Task cannot be {to}"),
        }
    }
}

impl From<std::io::Error> for VideoError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}
