//! Download engine for vhunter.
//!
//! Wraps an external extraction/transfer tool (yt-dlp), a Douyin platform
//! resolver and ffmpeg behind the ports defined in `vhunter-core`, and runs
//! download tasks through a bounded worker pool.
//!
//! # Modules
//!
//! - `hosts` - per-host request shaping
//! - `extract` - metadata extraction and failure diagnosis
//! - `platform` - Douyin URL handling, APIs, relays and page scraping
//! - `transfer` - the transfer process driver and its output grammar
//! - `artifact` - locating and remuxing downloaded files
//! - `orchestrator` - task registry, queue, workers and observer fan-out

// Re-export core types for convenience
pub use vhunter_core::{
    DownloadRequest, ProgressSample, Task, TaskEvent, TaskId, TaskStatus, VideoDescriptor,
    VideoError,
};

pub mod artifact;
pub mod direct;
pub mod extract;
pub mod hosts;
pub mod info;
pub mod orchestrator;
pub mod platform;
pub(crate) mod process;
pub(crate) mod progress;
pub mod transfer;

pub use artifact::{ArtifactResolver, FfmpegRemuxer};
pub use direct::DouyinDirect;
pub use extract::ExtractionClient;
pub use info::VideoInfoService;
pub use orchestrator::{
    TaskManager, TaskManagerConfig, TaskManagerDeps, build_task_manager,
};
pub use platform::{DouyinResolver, ResolvedMedia};
pub use transfer::TransferDriver;
