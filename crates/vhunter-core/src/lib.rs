//! Core domain types and port definitions for vhunter.
//!
//! This crate holds the pure data model shared by the download engine and
//! the web adapter: tasks and their state machine, video descriptors, the
//! error taxonomy, settings, and the ports the engine is wired through.
//! It performs no I/O.

pub mod descriptor;
pub mod errors;
pub mod ports;
pub mod settings;
pub mod task;

// Re-export commonly used types for convenience
pub use descriptor::{FailureCategory, Format, VideoDescriptor};
pub use errors::VideoError;
pub use ports::{
    DirectDownloadPort, DirectOutcome, MetadataPort, NoopObserver, ObserverError, ObserverId,
    ProgressCallback, Remuxer, TaskObserver, TransferPort,
};
pub use settings::{
    DouyinSettings, DownloaderSettings, LogSettings, ServerSettings, Settings, SettingsError,
    YtDlpSettings, validate_settings,
};
pub use task::{DownloadRequest, ProgressSample, Task, TaskEvent, TaskId, TaskStatus};
