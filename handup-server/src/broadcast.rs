//! Fan-out of lifecycle events to connected observers.
//!
//! The lifecycle engine publishes through the [`EventSink`] trait rather
//! than a process-wide singleton, so tests can inject a capturing sink or
//! subscribe to the real hub. [`BroadcastHub`] is a thin wrapper over
//! [`tokio::sync::broadcast`]: publishing never blocks, observers that
//! connect later see no replay, and a slow observer lags and drops events
//! instead of stalling writers.

use handup_proto::event::BoardEvent;
use tokio::sync::broadcast;

/// Default capacity of the event channel before slow observers lag.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Publish-only seam between the lifecycle engine and its observers.
pub trait EventSink: Send + Sync {
    /// Publishes one event, best-effort. Must never block.
    fn publish(&self, event: BoardEvent);
}

/// Broadcast channel shared by all WebSocket connections.
pub struct BroadcastHub {
    tx: broadcast::Sender<BoardEvent>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl BroadcastHub {
    /// Creates a hub whose channel buffers up to `capacity` events per
    /// observer before lagging.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes a new observer. The receiver sees only events published
    /// after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.tx.subscribe()
    }

    /// Number of currently subscribed observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for BroadcastHub {
    fn publish(&self, event: BoardEvent) {
        // send only fails when there are zero receivers, which is fine:
        // broadcast is best-effort by design.
        let delivered = self.tx.send(event.clone()).unwrap_or(0);
        tracing::debug!(kind = event.kind(), observers = delivered, "event published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handup_proto::task::TaskId;

    #[test]
    fn publish_without_observers_does_not_panic() {
        let hub = BroadcastHub::default();
        hub.publish(BoardEvent::TaskDeleted(TaskId::new()));
    }

    #[tokio::test]
    async fn all_current_observers_receive_each_event() {
        let hub = BroadcastHub::default();
        let mut rx1 = hub.subscribe();
        let mut rx2 = hub.subscribe();
        assert_eq!(hub.observer_count(), 2);

        let id = TaskId::new();
        hub.publish(BoardEvent::TaskDeleted(id));

        assert_eq!(rx1.recv().await.unwrap(), BoardEvent::TaskDeleted(id));
        assert_eq!(rx2.recv().await.unwrap(), BoardEvent::TaskDeleted(id));
    }

    #[tokio::test]
    async fn late_subscriber_sees_no_replay() {
        let hub = BroadcastHub::default();
        let _keepalive = hub.subscribe();
        hub.publish(BoardEvent::TaskDeleted(TaskId::new()));

        let mut late = hub.subscribe();
        let second = TaskId::new();
        hub.publish(BoardEvent::TaskDeleted(second));

        // The late subscriber's first event is the second publish.
        assert_eq!(late.recv().await.unwrap(), BoardEvent::TaskDeleted(second));
    }
}
