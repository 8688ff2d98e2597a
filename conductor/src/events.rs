//! Fan-out of lifecycle events to tracing and live subscribers.

use conductor_sdk::OrchestratorEvent;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Emits every event through `tracing` and to any broadcast subscribers
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: OrchestratorEvent) {
        event.emit();
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    /// Receive events emitted from now on. Slow receivers observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.tx.subscribe()
    }
}
