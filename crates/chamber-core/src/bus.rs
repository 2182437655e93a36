// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcast event bus carrying engine lifecycle events to host subscribers.
//!
//! The bus is the canonical channel for session and turn updates. Slow
//! subscribers lag and miss events rather than blocking the engine.

use tokio::sync::broadcast;

use crate::types::StreamDelta;

/// Default buffered capacity per subscriber.
const DEFAULT_CAPACITY: usize = 256;

/// Engine lifecycle events published to the host.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    SessionCreated { session_id: String },
    SessionUpdated { session_id: String },
    SessionDeleted { session_id: String },
    TurnStarted { session_id: String },
    TurnCompleted { session_id: String },
    /// Incremental assistant output during a streaming provider call.
    AssistantDelta {
        session_id: String,
        delta: StreamDelta,
    },
    /// The context budget crossed the warning threshold.
    ContextWarning {
        session_id: String,
        message: String,
    },
}

/// Fan-out publisher for [`EngineEvent`].
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. A bus with no subscribers drops events silently.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(EngineEvent::SessionCreated {
            session_id: "s-1".into(),
        });
        match rx.recv().await.unwrap() {
            EngineEvent::SessionCreated { session_id } => assert_eq!(session_id, "s-1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::default();
        bus.publish(EngineEvent::TurnStarted {
            session_id: "s-1".into(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
