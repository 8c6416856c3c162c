//! Per-user broker event fan-out. A slow subscriber does not block the
//! adapter: `tokio::sync::broadcast` drops the oldest buffered message for
//! lagging receivers, which is exactly the "bounded buffer, overflow drops
//! oldest" policy called for here.

use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use sfp_types::events::BrokerEvent;

const DEFAULT_BUFFER: usize = 1024;

#[derive(Default)]
pub struct EventBus {
    channels: DashMap<String, broadcast::Sender<BrokerEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel_for(&self, user_id: &str) -> broadcast::Sender<BrokerEvent> {
        self.channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(DEFAULT_BUFFER).0)
            .clone()
    }

    pub fn publish(&self, user_id: &str, event: BrokerEvent) {
        let tx = self.channel_for(user_id);
        if tx.send(event).is_err() {
            // No subscribers yet; nothing to deliver to.
        }
    }

    /// A lazy stream of events scoped to `user_id`. Lag (buffer overflow)
    /// surfaces as a logged warning and the stream simply continues from
    /// the next available message.
    pub fn subscribe(&self, user_id: &str) -> impl futures_util::Stream<Item = BrokerEvent> {
        let rx = self.channel_for(user_id).subscribe();
        let user_id = user_id.to_string();
        BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(user_id = %user_id, skipped, "broker event stream overflowed, dropped oldest");
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfp_types::events::BrokerEventKind;
    use uuid::Uuid;

    fn sample_event() -> BrokerEvent {
        BrokerEvent {
            order_id: Uuid::new_v4(),
            broker_order_id: "b1".into(),
            idempotency_key: "k1".into(),
            kind: BrokerEventKind::Ack,
            ts_millis: 0,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut stream = Box::pin(bus.subscribe("u1"));
        bus.publish("u1", sample_event());
        let received = stream.next().await;
        assert!(received.is_some());
    }

    #[tokio::test]
    async fn events_for_other_users_are_not_delivered() {
        let bus = EventBus::new();
        let mut stream_u2 = Box::pin(bus.subscribe("u2"));
        bus.publish("u1", sample_event());
        let fut = tokio::time::timeout(std::time::Duration::from_millis(50), stream_u2.next());
        assert!(fut.await.is_err(), "u2 must not see u1's events");
    }
}
