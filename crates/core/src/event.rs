//! Domain event system: decoupled communication between bounded contexts.
//!
//! Events are published when something interesting happens in the system.
//! Other components can subscribe to react without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A message arrived from the chat platform
    MessageReceived {
        channel: String,
        user: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The relevance gate decided whether to answer
    RelevanceDecided {
        channel: String,
        should_respond: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was dispatched
    ToolDispatched {
        tool_name: String,
        produced: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Records were written to memory
    MemoryWritten {
        role: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A record was removed after its platform message was deleted
    MemoryDeleted {
        message_ts: String,
        timestamp: DateTime<Utc>,
    },

    /// Historical import finished
    BackfillCompleted {
        channels: usize,
        records: usize,
        failures: usize,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
