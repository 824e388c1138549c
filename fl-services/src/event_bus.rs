//! Typed event bus for intra-service communication.
//!
//! Uses tokio broadcast channels to decouple services from one another.
//! Any service can emit events without knowing who is listening, and any
//! number of subscribers can independently consume events.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// All application-level event types that flow through the event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A record was written to the store.
    RecordCreated {
        id: i64,
    },
    /// An existing record was edited.
    RecordUpdated {
        id: i64,
    },
    /// A record was permanently removed.
    RecordDeleted {
        id: i64,
    },
    /// The favorite flag of a record flipped.
    FavoriteToggled {
        id: i64,
        favorite: bool,
    },
    /// A backup document was imported.
    ImportCompleted {
        imported: usize,
        skipped: usize,
    },
    /// A backup document was produced.
    ExportCompleted {
        records: usize,
    },
    /// Background compression failed and the service switched to the
    /// calling thread.
    CompressionFellBack {
        reason: String,
    },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Designed for fan-out delivery: every subscriber gets every event.
/// Slow subscribers that fall behind will receive a `Lagged` error
/// and may miss events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to receive application events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("event_bus: emitted {label} to {count} subscriber(s)");
            }
            Err(_) => {
                debug!("event_bus: no subscribers for {label}");
            }
        }
    }

    /// Get the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Human-readable label for an event (for logging).
fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::RecordCreated { .. } => "RecordCreated",
        AppEvent::RecordUpdated { .. } => "RecordUpdated",
        AppEvent::RecordDeleted { .. } => "RecordDeleted",
        AppEvent::FavoriteToggled { .. } => "FavoriteToggled",
        AppEvent::ImportCompleted { .. } => "ImportCompleted",
        AppEvent::ExportCompleted { .. } => "ExportCompleted",
        AppEvent::CompressionFellBack { .. } => "CompressionFellBack",
    }
}
