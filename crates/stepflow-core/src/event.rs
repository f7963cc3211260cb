use crate::types::FlowEvent;

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<FlowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: FlowEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    /// Publish an event built on demand; `build` is skipped when there are
    /// no subscribers.
    pub fn publish_with(&self, build: impl FnOnce() -> FlowEvent) {
        if self.has_subscribers() {
            self.publish(build());
        }
    }

    pub fn has_subscribers(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<FlowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
