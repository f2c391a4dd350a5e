//! HTTP request handlers for the Axum web server.
//!
//! Handlers are thin wrappers that delegate to the `TaskManager`.

pub mod direct;
pub mod events;
pub mod files;
pub mod health;
pub mod info;
pub mod tasks;
pub mod ws;
