//! Lifecycle shared by the record, compression and data operations services.
//!
//! The registry drives every service through `Created -> Running -> Stopped`
//! and reports the resulting state in `health_check`.

use std::fmt;

use fl_core::error::FlResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Running,
    Stopped,
}

impl ServiceState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit started by [`ServiceRegistry::init_all`](crate::registry::ServiceRegistry::init_all).
///
/// `init` runs once before any record or backup operation; `shutdown` may be
/// called on a service that never started and must not fail in that case.
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> ServiceState;

    fn init(&mut self) -> FlResult<()>;

    fn shutdown(&mut self) -> FlResult<()>;

    /// Only a running service accepts work.
    fn is_healthy(&self) -> bool {
        matches!(self.state(), ServiceState::Running)
    }
}
