//! Domain event fan-out over a tokio broadcast channel

use tokio::sync::broadcast;
use tracing::debug;

use diyafa_core::{DomainEvent, EventSink};

/// Events buffered per subscriber before the slowest one starts lagging
const EVENT_BUFFER: usize = 256;

/// [`EventSink`] feeding every subscriber of a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            debug!("No event subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diyafa_core::{BookingStatus, EventKind};
    use uuid::Uuid;

    fn event() -> DomainEvent {
        DomainEvent {
            kind: EventKind::BookingCreated,
            booking_id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            guest_id: Uuid::new_v4(),
            status: BookingStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let sink = BroadcastSink::new();
        let mut rx = sink.subscribe();

        let sent = event();
        sink.publish(sent.clone());
        assert_eq!(rx.recv().await.unwrap(), sent);
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        BroadcastSink::new().publish(event());
    }
}
