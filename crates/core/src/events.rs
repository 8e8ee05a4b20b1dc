//! Outbound domain events
//!
//! The reservation service publishes a [`DomainEvent`] after every committed
//! booking change. Sinks must not block; delivery belongs to the
//! notification collaborator behind the sink.

use std::sync::Mutex;

use crate::models::DomainEvent;

pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: DomainEvent) {}
}

/// Keeps events in memory, in publish order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything published so far
    pub fn drain(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
