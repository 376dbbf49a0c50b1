//! Event types for the newscast event system
//!
//! Provides the shared event enum and the `EventBus` used to broadcast
//! fan-out events to in-process consumers. The `Announcement` event is the
//! alternative delivery primitive: consumers outside the HTTP channel model
//! (e.g. a pub/sub bridge) subscribe to the bus and forward announcements
//! on their own transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Newscast event types
///
/// Events are broadcast via [`EventBus`] and serialize with a `type` tag so
/// they can be forwarded verbatim over JSON transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NewscastEvent {
    /// A news item was published; carries the full fan-out payload.
    ///
    /// `usernames` holds the delivery handles of every matched subscriber,
    /// `topic` names the logical channel the announcement belongs to.
    Announcement {
        topic: String,
        usernames: Vec<String>,
        title: String,
        content: String,
        timestamp: DateTime<Utc>,
    },

    /// Delivery jobs were registered for a news item
    DeliveriesScheduled {
        title: String,
        jobs: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`NewscastEvent`]
///
/// Thin wrapper over `tokio::sync::broadcast`; publishing never blocks and
/// events published with no active subscribers are dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<NewscastEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<NewscastEvent> {
        self.tx.subscribe()
    }

    /// Publish an event, returning the number of subscribers it reached
    pub fn publish(&self, event: NewscastEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                // No subscribers; fan-out over the bus is best-effort
                tracing::debug!("Event published with no subscribers");
                0
            }
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
