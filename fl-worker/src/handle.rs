//! Background execution context and the async call interface.
//!
//! A [`WorkerHandle`] owns at most one worker thread at a time. The thread is
//! spawned on first use, reused for later requests, and replaced lazily if it
//! dies or is terminated. Each request is moved to the thread over a channel;
//! responses come back through the [`Router`], keyed by correlation id.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use fl_core::error::{FlError, FlResult};

use crate::progress::ProgressReporter;
use crate::protocol::{Envelope, RequestIdGenerator, RequestKind, WorkerResponse};
use crate::router::{ListenerGuard, Router};

/// Work performed on the background thread.
pub trait Job: Send + 'static {
    type Request: Send + 'static;
    type Output: Send + 'static;

    /// Kind of `request`, used for its correlation id.
    fn kind(request: &Self::Request) -> RequestKind;

    /// Process one request, reporting progress as it goes.
    fn handle(&mut self, request: Self::Request, progress: &ProgressReporter<'_>) -> FlResult<Self::Output>;
}

type Factory<J> = Arc<dyn Fn() -> J + Send + Sync>;

struct Context<J: Job> {
    sender: std_mpsc::Sender<Envelope<J::Request>>,
    router: Router<J::Output>,
    thread: JoinHandle<()>,
}

impl<J: Job> Context<J> {
    fn is_alive(&self) -> bool {
        !self.thread.is_finished()
    }
}

/// Lazily started, reusable handle to a background worker.
pub struct WorkerHandle<J: Job> {
    name: String,
    factory: Factory<J>,
    context: Mutex<Option<Context<J>>>,
    ids: RequestIdGenerator,
}

impl<J: Job> WorkerHandle<J> {
    /// Create a handle. No thread is started until the first call.
    pub fn new(name: impl Into<String>, factory: impl Fn() -> J + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            context: Mutex::new(None),
            ids: RequestIdGenerator::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Option<Context<J>>> {
        self.context.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make sure a live worker thread exists, spawning one if needed.
    ///
    /// Fails with `WorkerTransport` when the thread cannot be spawned, which
    /// makes this usable as a capability probe.
    pub fn start(&self) -> FlResult<()> {
        let mut guard = self.lock();
        self.ensure_context(&mut guard).map(|_| ())
    }

    fn ensure_context<'g>(&self, slot: &'g mut Option<Context<J>>) -> FlResult<&'g Context<J>> {
        if let Some(ctx) = slot.as_ref() {
            if !ctx.is_alive() {
                warn!(worker = %self.name, "worker thread exited, starting a new one");
                ctx.router.fail_all("worker exited");
                *slot = None;
            }
        }

        if slot.is_none() {
            *slot = Some(self.spawn()?);
        }

        slot.as_ref()
            .ok_or_else(|| FlError::WorkerTransport(format!("{} worker unavailable", self.name)))
    }

    fn spawn(&self) -> FlResult<Context<J>> {
        let (sender, receiver) = std_mpsc::channel::<Envelope<J::Request>>();
        let router: Router<J::Output> = Router::new();
        let factory = Arc::clone(&self.factory);
        let thread_router = router.clone();
        let name = self.name.clone();

        let thread = std::thread::Builder::new()
            .name(format!("fl-worker-{}", self.name))
            .spawn(move || run_loop(name, factory, receiver, thread_router))
            .map_err(|e| FlError::WorkerTransport(format!("cannot start {} worker: {e}", self.name)))?;

        info!(worker = %self.name, "worker started");
        Ok(Context { sender, router, thread })
    }

    /// Whether a live worker thread currently exists.
    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(Context::is_alive)
    }

    /// Number of requests waiting for a terminal response.
    pub fn outstanding(&self) -> usize {
        self.lock().as_ref().map_or(0, |ctx| ctx.router.outstanding())
    }

    /// Tear the worker down. Outstanding requests fail with
    /// `WorkerTransport`; the next call starts a fresh worker.
    ///
    /// A job already running finishes on the detached thread and its result
    /// is discarded.
    pub fn terminate(&self) {
        let taken = self.lock().take();
        if let Some(ctx) = taken {
            let failed = ctx.router.fail_all("worker terminated");
            drop(ctx.sender);
            info!(worker = %self.name, failed, "worker terminated");
        }
    }

    /// Send `request` to the worker and wait for its terminal response.
    ///
    /// `on_progress` sees every progress value for this request only.
    /// Dropping the returned future detaches the listener.
    pub async fn call(
        &self,
        request: J::Request,
        mut on_progress: impl FnMut(u8),
    ) -> FlResult<J::Output> {
        let id = self.ids.next(J::kind(&request));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _guard = {
            let mut slot = self.lock();
            let ctx = self.ensure_context(&mut slot)?;
            ctx.router.register(id.clone(), tx);
            let guard = ListenerGuard::new(ctx.router.clone(), id.clone());
            ctx.sender
                .send(Envelope { id: id.clone(), request })
                .map_err(|_| FlError::WorkerTransport(format!("{} worker is not accepting requests", self.name)))?;
            guard
        };
        debug!(worker = %self.name, %id, "request sent");

        loop {
            match rx.recv().await {
                Some(WorkerResponse::Progress { progress, .. }) => on_progress(progress),
                Some(WorkerResponse::Success { data, .. }) => {
                    debug!(worker = %self.name, %id, "request succeeded");
                    return Ok(data);
                }
                Some(WorkerResponse::Error { kind, error, .. }) => {
                    debug!(worker = %self.name, %id, ?kind, "request failed");
                    return Err(FlError::from_kind(kind, error));
                }
                None => {
                    return Err(FlError::WorkerTransport(format!(
                        "{} worker dropped request {id}",
                        self.name
                    )))
                }
            }
        }
    }
}

impl<J: Job> Drop for WorkerHandle<J> {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Body of the worker thread: process requests one at a time until the
/// channel closes.
///
/// A panicking job fails its own request with `WorkerTransport` and is
/// replaced by a fresh instance before the next request.
fn run_loop<J: Job>(
    name: String,
    factory: Factory<J>,
    receiver: std_mpsc::Receiver<Envelope<J::Request>>,
    router: Router<J::Output>,
) {
    let mut job = factory();
    while let Ok(Envelope { id, request }) = receiver.recv() {
        let reporter = ProgressReporter::new(|progress| {
            router.deliver(WorkerResponse::Progress { id: id.clone(), progress });
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.handle(request, &reporter)));
        drop(reporter);

        match outcome {
            Ok(Ok(data)) => router.deliver(WorkerResponse::Success { id, data }),
            Ok(Err(e)) => router.deliver(WorkerResponse::failure(id, &e)),
            Err(payload) => {
                let message = format!("{name} worker crashed: {}", panic_message(payload.as_ref()));
                error!(worker = %name, %id, "{message}");
                router.deliver(WorkerResponse::transport(id, message));
                job = factory();
            }
        }
    }
    router.fail_all("worker exited");
    debug!(worker = %name, "worker loop finished");
}

impl<J: Job> WorkerHandle<J> {
    /// Run `request` on the calling thread with a fresh job instance.
    ///
    /// Same result shape as [`WorkerHandle::call`]; used when background
    /// execution is unavailable.
    pub fn run_here(&self, request: J::Request, on_progress: impl FnMut(u8)) -> FlResult<J::Output> {
        let id = self.ids.next(J::kind(&request));
        debug!(worker = %self.name, %id, "running on the calling thread");
        let mut job = (self.factory)();
        let reporter = ProgressReporter::new(on_progress);
        job.handle(request, &reporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use fl_core::ErrorKind;

    /// Test job: doubles a number, with a few special inputs.
    struct Doubler;

    impl Job for Doubler {
        type Request = i64;
        type Output = i64;

        fn kind(_: &i64) -> RequestKind {
            RequestKind::Compress
        }

        fn handle(&mut self, n: i64, progress: &ProgressReporter<'_>) -> FlResult<i64> {
            progress.report(0);
            match n {
                -1 => Err(FlError::ImageDecode("not an image".into())),
                -2 => panic!("boom"),
                -3 => {
                    std::thread::sleep(Duration::from_millis(300));
                    Ok(0)
                }
                _ => {
                    progress.report(50);
                    progress.report(100);
                    Ok(n * 2)
                }
            }
        }
    }

    fn handle() -> WorkerHandle<Doubler> {
        WorkerHandle::new("test", || Doubler)
    }

    #[tokio::test]
    async fn test_lazy_start_and_reuse() {
        let worker = handle();
        assert!(!worker.is_running());

        let mut seen = Vec::new();
        assert_eq!(worker.call(21, |p| seen.push(p)).await.unwrap(), 42);
        assert_eq!(seen, vec![0, 50, 100]);
        assert!(worker.is_running());

        assert_eq!(worker.call(5, |_| {}).await.unwrap(), 10);
        assert_eq!(worker.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_error_kind_crosses_boundary() {
        let worker = handle();
        let err = worker.call(-1, |_| {}).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ImageDecode);
        assert!(err.to_string().contains("not an image"));
    }

    #[tokio::test]
    async fn test_panic_becomes_transport_error_and_recovers() {
        let worker = handle();
        let err = worker.call(-2, |_| {}).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WorkerTransport);
        assert!(err.to_string().contains("boom"));

        assert_eq!(worker.call(4, |_| {}).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_terminate_fails_outstanding() {
        let worker = Arc::new(handle());
        let caller = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.call(-3, |_| {}).await })
        };
        while worker.outstanding() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        worker.terminate();

        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WorkerTransport);
        assert!(!worker.is_running());

        assert_eq!(worker.call(1, |_| {}).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dropped_future_detaches_listener() {
        let worker = handle();
        tokio::select! {
            _ = worker.call(-3, |_| {}) => panic!("slow job finished first"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        assert_eq!(worker.outstanding(), 0);

        // The late result is ignored and the worker keeps serving.
        assert_eq!(worker.call(3, |_| {}).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_concurrent_requests_keep_their_progress() {
        let worker = Arc::new(handle());
        let mut tasks = Vec::new();
        for n in 1..=4 {
            let worker = Arc::clone(&worker);
            tasks.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                let out = worker.call(n, |p| seen.push(p)).await.unwrap();
                (n, out, seen)
            }));
        }
        for task in tasks {
            let (n, out, seen) = task.await.unwrap();
            assert_eq!(out, n * 2);
            assert_eq!(seen, vec![0, 50, 100]);
        }
    }

    #[test]
    fn test_run_here() {
        let worker = handle();
        let mut seen = Vec::new();
        assert_eq!(worker.run_here(7, |p| seen.push(p)).unwrap(), 14);
        assert_eq!(seen, vec![0, 50, 100]);
        assert!(!worker.is_running());
    }
}
