use tokio::sync::broadcast;

use crate::model::DomainEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub feeding reservation events to notification and loyalty
/// collaborators. Slow subscribers lag; they never block the engine.
pub struct NotifyHub {
    sender: broadcast::Sender<DomainEvent>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. No-op if nobody is listening.
    pub fn send(&self, event: DomainEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CancelReason;
    use ulid::Ulid;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        let event = DomainEvent::ReservationCancelled {
            reservation_id: Ulid::new(),
            table_id: None,
            reason: CancelReason::Manual,
        };
        hub.send(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        hub.send(DomainEvent::ReservationCancelled {
            reservation_id: Ulid::new(),
            table_id: None,
            reason: CancelReason::NoShow,
        });
    }

    #[test]
    fn cancelled_event_json_shape() {
        let id = Ulid::new();
        let json = serde_json::to_value(DomainEvent::ReservationCancelled {
            reservation_id: id,
            table_id: None,
            reason: CancelReason::NoShow,
        })
        .unwrap();
        assert_eq!(json["type"], "ReservationCancelled");
        assert_eq!(json["reason"], "no_show");
        assert_eq!(json["reservation_id"], id.to_string());
    }
}
