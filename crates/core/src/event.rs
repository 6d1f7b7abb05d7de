//! Domain events emitted by a Run.
//!
//! The agent loop publishes what it does here; the CLI and chat front ends
//! subscribe to render progress without the loop knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The model produced a final answer.
    ResponseGenerated {
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool ran (successfully or not).
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The loop governor refused a call.
    ToolCallBlocked {
        tool_name: String,
        count: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The primary model failed transiently and the fallback answered.
    FallbackModelUsed {
        primary: String,
        fallback: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`DomainEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
