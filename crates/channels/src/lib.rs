//! Chat notifiers for openshrimp.
//!
//! The agent only ever sends to the human side: questions, interim
//! updates and reminders. Each channel implements `Notifier`.
//!
//! Available channels:
//! - **Console**: stdout, with stdin lines answering pending questions
//! - **Telegram**: Bot API `sendMessage`, long texts split into chunks

pub mod console;
pub mod telegram;

pub use console::{ConsoleNotifier, spawn_stdin_responder};
pub use telegram::{TelegramNotifier, chunk_text};
