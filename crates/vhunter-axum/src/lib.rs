//! Axum web adapter for vhunter.
//!
//! Exposes the task orchestrator over HTTP, Server-Sent Events and a
//! WebSocket, and hosts the composition root used by the `vhunter` binary.

pub mod bootstrap;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod sse;
pub mod state;

// Re-export primary types
pub use bootstrap::{AxumContext, CorsConfig, bootstrap, start_server};
pub use cli::Cli;
pub use error::HttpError;
pub use logging::init_tracing;
pub use routes::create_router;
pub use sse::SseBroadcaster;
pub use state::AppState;
