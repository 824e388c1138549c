//! Routes worker responses to the caller waiting on each correlation id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::protocol::{RequestId, WorkerResponse};

type Listeners<T> = HashMap<RequestId, UnboundedSender<WorkerResponse<T>>>;

/// Table of outstanding requests shared between callers and the worker thread.
pub struct Router<T> {
    listeners: Arc<Mutex<Listeners<T>>>,
}

impl<T> Clone for Router<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> Router<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Listeners<T>> {
        // A panic while holding the lock leaves the map itself consistent.
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start listening for responses to `id`.
    pub fn register(&self, id: RequestId, listener: UnboundedSender<WorkerResponse<T>>) {
        self.lock().insert(id, listener);
    }

    /// Stop listening for `id`. Later responses for it are ignored.
    pub fn detach(&self, id: &RequestId) {
        if self.lock().remove(id).is_some() {
            debug!(%id, "listener detached");
        }
    }

    /// Hand `response` to its listener. Unknown ids are ignored; a terminal
    /// response detaches the listener.
    pub fn deliver(&self, response: WorkerResponse<T>) {
        let mut listeners = self.lock();
        let id = response.id().clone();
        let listener = if response.is_terminal() {
            listeners.remove(&id)
        } else {
            listeners.get(&id).cloned()
        };
        drop(listeners);

        match listener {
            Some(tx) => {
                if tx.send(response).is_err() {
                    debug!(%id, "caller went away, dropping response");
                    self.detach(&id);
                }
            }
            None => debug!(%id, "ignoring response for unknown request"),
        }
    }

    /// Fail every outstanding request with a transport error.
    pub fn fail_all(&self, message: &str) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (id, tx) in drained {
            let _ = tx.send(WorkerResponse::transport(id, message));
        }
        if count > 0 {
            debug!(count, message, "failed outstanding requests");
        }
        count
    }

    /// Number of requests still waiting for a terminal response.
    pub fn outstanding(&self) -> usize {
        self.lock().len()
    }
}

/// Detaches its listener when dropped, e.g. when the caller's future is
/// cancelled before a terminal response arrives.
pub struct ListenerGuard<T> {
    router: Router<T>,
    id: RequestId,
}

impl<T> ListenerGuard<T> {
    pub fn new(router: Router<T>, id: RequestId) -> Self {
        Self { router, id }
    }
}

impl<T> Drop for ListenerGuard<T> {
    fn drop(&mut self) {
        self.router.detach(&self.id);
    }
}
