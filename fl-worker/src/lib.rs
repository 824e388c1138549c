//! FoodLog Worker - request protocol for background execution.
//!
//! This crate provides the plumbing that moves heavy work (photo compression,
//! export, import, validation) off the caller's task:
//! - Correlation ids of the form `<prefix>_<counter>_<millis>`
//! - Progress / success / error response envelopes
//! - A lazily started, reusable worker thread per [`WorkerHandle`]
//! - Routing of responses by id, ignoring ids nobody waits for
//! - Transport faults surfaced as `WorkerTransport` errors

pub mod handle;
pub mod progress;
pub mod protocol;
pub mod router;

// Re-export key types
pub use handle::{Job, WorkerHandle};
pub use progress::ProgressReporter;
pub use protocol::{Envelope, RequestId, RequestIdGenerator, RequestKind, WorkerResponse};
pub use router::{ListenerGuard, Router};
