//! Request/response envelopes exchanged with a background worker.
//!
//! Every request carries a correlation id of the form
//! `<prefix>_<counter>_<unix-millis>`. The worker answers with zero or more
//! `Progress` messages followed by exactly one terminal `Success` or `Error`
//! for that id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use fl_core::constants::request_prefix;
use fl_core::error::{ErrorKind, FlError};

/// The operations a worker can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Compress,
    Export,
    Import,
    Validate,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::Export => "export",
            Self::Import => "import",
            Self::Validate => "validate",
        }
    }

    /// Correlation-id prefix used for this kind of request.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Compress => request_prefix::COMPRESS,
            Self::Export => request_prefix::EXPORT,
            Self::Import => request_prefix::IMPORT,
            Self::Validate => request_prefix::VALIDATE,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation id tying responses to the request that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues session-unique correlation ids from a monotonic counter.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for a request of `kind`.
    pub fn next(&self, kind: RequestKind) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = chrono::Utc::now().timestamp_millis();
        RequestId(format!("{}_{}_{}", kind.id_prefix(), n, millis))
    }
}

/// A request handed to the worker thread. Moved, never shared.
#[derive(Debug)]
pub struct Envelope<R> {
    pub id: RequestId,
    pub request: R,
}

/// A message from the worker about one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerResponse<T> {
    Progress {
        id: RequestId,
        progress: u8,
    },
    Success {
        id: RequestId,
        data: T,
    },
    Error {
        id: RequestId,
        kind: ErrorKind,
        error: String,
    },
}

impl<T> WorkerResponse<T> {
    pub fn id(&self) -> &RequestId {
        match self {
            Self::Progress { id, .. } | Self::Success { id, .. } | Self::Error { id, .. } => id,
        }
    }

    /// Whether this response ends the exchange for its id.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }

    /// Terminal error response carrying the category of `err`.
    pub fn failure(id: RequestId, err: &FlError) -> Self {
        Self::Error {
            id,
            kind: err.kind(),
            error: err.detail(),
        }
    }

    /// Terminal transport error synthesized on the caller's side.
    pub fn transport(id: RequestId, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            kind: ErrorKind::WorkerTransport,
            error: message.into(),
        }
    }
}
