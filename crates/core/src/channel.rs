//! Notifier trait: the outbound side of a chat channel.
//!
//! The agent core only ever *sends*: questions from `ask_human`, progress
//! updates, stale-question reminders. Receiving messages belongs to the
//! chat front end.

use async_trait::async_trait;
use crate::error::ChannelError;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "console").
    fn name(&self) -> &str;

    /// Send a text message to a chat session.
    async fn send_message(&self, session_id: &str, text: &str) -> Result<(), ChannelError>;
}
