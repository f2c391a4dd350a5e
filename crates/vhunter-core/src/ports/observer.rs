//! Task observer port.
//!
//! Observers receive every [`TaskEvent`] the orchestrator broadcasts. A
//! delivery error removes the observer from the set; other observers are
//! unaffected.

use std::fmt;

use thiserror::Error;

use crate::task::TaskEvent;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Why an event could not be delivered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObserverError {
    /// The peer went away.
    #[error("observer closed")]
    Closed,
    /// The peer is not keeping up.
    #[error("observer buffer full")]
    Backpressure,
}

/// A live subscriber to task events.
///
/// `deliver` is called while broadcasting to every observer in turn, so it
/// must not block; buffer or drop instead.
pub trait TaskObserver: Send + Sync {
    fn deliver(&self, event: &TaskEvent) -> Result<(), ObserverError>;
}

/// An observer that accepts and discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TaskObserver for NoopObserver {
    fn deliver(&self, _event: &TaskEvent) -> Result<(), ObserverError> {
        Ok(())
    }
}
