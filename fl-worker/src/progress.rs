//! Worker-side progress reporting.

use std::cell::{Cell, RefCell};

/// Forwards progress percentages for one request.
///
/// Values are clamped to 100 and never go backwards; repeats of the last
/// reported value are dropped.
pub struct ProgressReporter<'a> {
    sink: RefCell<Box<dyn FnMut(u8) + 'a>>,
    last: Cell<Option<u8>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: impl FnMut(u8) + 'a) -> Self {
        Self {
            sink: RefCell::new(Box::new(sink)),
            last: Cell::new(None),
        }
    }

    /// Reporter that discards everything.
    pub fn silent() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, progress: u8) {
        let value = progress.min(100);
        if let Some(last) = self.last.get() {
            if value <= last {
                if value < last {
                    tracing::trace!(value, last, "progress went backwards, holding");
                }
                return;
            }
        }
        self.last.set(Some(value));
        (self.sink.borrow_mut())(value);
    }

    /// Last value forwarded, if any.
    pub fn last(&self) -> Option<u8> {
        self.last.get()
    }
}
