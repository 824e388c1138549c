//! Compression service: runs the photo pipeline off the caller's task.
//!
//! The execution strategy is picked once, when the service is built: if a
//! background worker can be started it is used, otherwise everything runs on
//! the calling thread. A worker that faults at runtime is abandoned for the
//! rest of the session and the failed request is re-run here, so callers see
//! the same result either way.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use fl_core::error::{FlError, FlResult};
use fl_core::ErrorKind;
use fl_imaging::{
    compress_photo, image_info, CompressionOptions, CompressionResult, ImageBackend, ImageInfo,
    RustBackend,
};
use fl_worker::{Job, ProgressReporter, RequestKind, WorkerHandle};

use crate::event_bus::{AppEvent, EventBus};
use crate::service::{Service, ServiceState};

/// Where compression requests are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Background,
    SameThread,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Background => write!(f, "background"),
            Self::SameThread => write!(f, "same-thread"),
        }
    }
}

type BackendFactory = Arc<dyn Fn() -> Box<dyn ImageBackend> + Send + Sync>;

/// One compression request as moved to the worker.
pub struct CompressRequest {
    pub source: Vec<u8>,
    pub options: CompressionOptions,
}

/// Worker job wrapping [`compress_photo`].
pub struct CompressionJob {
    backend: Box<dyn ImageBackend>,
}

impl CompressionJob {
    pub fn new(backend: Box<dyn ImageBackend>) -> Self {
        Self { backend }
    }
}

impl Job for CompressionJob {
    type Request = CompressRequest;
    type Output = CompressionResult;

    fn kind(_request: &Self::Request) -> RequestKind {
        RequestKind::Compress
    }

    fn handle(&mut self, request: Self::Request, progress: &ProgressReporter<'_>) -> FlResult<Self::Output> {
        compress_photo(self.backend.as_ref(), &request.source, &request.options, &|p| {
            progress.report(p)
        })
    }
}

/// Service that compresses captured photos before they are stored.
pub struct CompressionService {
    state: ServiceState,
    defaults: CompressionOptions,
    worker: WorkerHandle<CompressionJob>,
    strategy: Mutex<ExecutionStrategy>,
    backend: Box<dyn ImageBackend>,
    event_bus: EventBus,
}

impl CompressionService {
    /// Create a service backed by the pure Rust image backend.
    pub fn new(defaults: CompressionOptions, use_background_worker: bool, event_bus: EventBus) -> Self {
        Self::with_backend(defaults, use_background_worker, event_bus, || {
            Box::new(RustBackend::new()) as Box<dyn ImageBackend>
        })
    }

    /// Create a service whose jobs use backends built by `factory`.
    ///
    /// With `use_background_worker` the worker is started right away; if it
    /// cannot be, the service settles on [`ExecutionStrategy::SameThread`].
    pub fn with_backend(
        defaults: CompressionOptions,
        use_background_worker: bool,
        event_bus: EventBus,
        factory: impl Fn() -> Box<dyn ImageBackend> + Send + Sync + 'static,
    ) -> Self {
        let factory: BackendFactory = Arc::new(factory);
        let job_factory = Arc::clone(&factory);
        let worker = WorkerHandle::new("compression", move || CompressionJob::new(job_factory()));

        let strategy = if !use_background_worker {
            info!("background compression disabled by configuration");
            ExecutionStrategy::SameThread
        } else {
            match worker.start() {
                Ok(()) => ExecutionStrategy::Background,
                Err(e) => {
                    warn!("background compression unavailable, using the calling thread: {e}");
                    ExecutionStrategy::SameThread
                }
            }
        };

        Self {
            state: ServiceState::Created,
            defaults,
            worker,
            strategy: Mutex::new(strategy),
            backend: factory(),
            event_bus,
        }
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        *self.strategy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Options used when a caller does not pass its own.
    pub fn defaults(&self) -> &CompressionOptions {
        &self.defaults
    }

    fn downgrade(&self, reason: &FlError) {
        let mut strategy = self.strategy.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *strategy == ExecutionStrategy::SameThread {
            return;
        }
        *strategy = ExecutionStrategy::SameThread;
        drop(strategy);

        warn!("compression worker failed, falling back to the calling thread: {reason}");
        self.worker.terminate();
        self.event_bus.emit(AppEvent::CompressionFellBack {
            reason: reason.detail(),
        });
    }

    /// Compress `source`, using the configured defaults unless `options` is given.
    ///
    /// `on_progress` receives 0..=100. After a worker fault the request is
    /// restarted on the calling thread, so progress may start over once.
    pub async fn compress(
        &self,
        source: &[u8],
        options: Option<CompressionOptions>,
        mut on_progress: impl FnMut(u8),
    ) -> FlResult<CompressionResult> {
        let options = options.unwrap_or(self.defaults);

        if self.strategy() == ExecutionStrategy::Background {
            let request = CompressRequest { source: source.to_vec(), options };
            match self.worker.call(request, &mut on_progress).await {
                Err(e) if e.kind() == ErrorKind::WorkerTransport => self.downgrade(&e),
                other => return other,
            }
        }

        self.worker
            .run_here(CompressRequest { source: source.to_vec(), options }, on_progress)
    }

    /// Dimensions, size and type of `source` without compressing it.
    pub fn image_info(&self, source: &[u8]) -> FlResult<ImageInfo> {
        image_info(self.backend.as_ref(), source)
    }
}

impl Service for CompressionService {
    fn name(&self) -> &str {
        "compression"
    }

    fn state(&self) -> ServiceState {
        self.state
    }

    fn init(&mut self) -> FlResult<()> {
        self.state = ServiceState::Running;
        info!(strategy = %self.strategy(), "compression service initialized");
        Ok(())
    }

    fn shutdown(&mut self) -> FlResult<()> {
        self.worker.terminate();
        self.state = ServiceState::Stopped;
        info!("compression service shut down");
        Ok(())
    }
}
