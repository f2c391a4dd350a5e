//! Port definitions (trait abstractions) for external systems.
//!
//! The engine talks to subprocesses, the network and live clients only
//! through these traits, so the orchestrator can be driven by stubs in tests.
//!
//! # Design Rules
//!
//! - Only domain types in signatures
//! - Every async port takes a `CancellationToken` so in-flight work can be aborted
//! - Observer delivery is synchronous and non-blocking

pub mod metadata;
pub mod observer;
pub mod remux;
pub mod transfer;

pub use metadata::MetadataPort;
pub use observer::{NoopObserver, ObserverError, ObserverId, TaskObserver};
pub use remux::Remuxer;
pub use transfer::{DirectDownloadPort, DirectOutcome, ProgressCallback, TransferPort};
