//! Task domain: identifiers, lifecycle, requests, progress and events.

mod events;
mod progress;
mod request;
mod types;

pub use events::TaskEvent;
pub use progress::ProgressSample;
pub use request::DownloadRequest;
pub use types::{Task, TaskId, TaskStatus};
