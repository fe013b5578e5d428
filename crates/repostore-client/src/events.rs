//! Notification sinks.
//!
//! The client publishes [`StoreEvent`]s fire-and-forget. Subscribers plug in
//! by implementing [`EventSink`]; publishing never fails and never blocks.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{info, warn};

use repostore_models::StoreEvent;

/// Destination for client notifications.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: StoreEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: StoreEvent) {
        let topic = event.topic();
        let payload = serde_json::to_string(&event).unwrap_or_default();
        match event {
            StoreEvent::OperationFailed { .. }
            | StoreEvent::AuthFailed { .. }
            | StoreEvent::FileReadError { .. }
            | StoreEvent::Unauthorized { .. } => warn!(topic, %payload, "store event"),
            _ => info!(topic, %payload, "store event"),
        }
    }
}

/// Fans events out to any number of `tokio` broadcast receivers.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<StoreEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: StoreEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}

/// Keeps every published event in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Topics in publication order.
    pub fn topics(&self) -> Vec<&'static str> {
        self.events().iter().map(StoreEvent::topic).collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: StoreEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
