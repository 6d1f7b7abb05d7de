//! # openshrimp core
//!
//! Domain types, traits, and error definitions for the openshrimp task agent.
//! Everything the agent loop talks to (LLM providers, tools, the archival
//! memory, the task tracker, the chat channel) is a trait here; the
//! implementations live in their own crates.
//!
//! The one piece of shared mutable state in the system, the human-input
//! gate, also lives here because both the tools crate (`ask_human`) and
//! the chat front end (`resolve`) need it.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod memory;
pub mod task;
pub mod channel;
pub mod effort;
pub mod human_input;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolContext, ToolRegistry, ToolResult};
pub use memory::{MemoryBackend, MemoryEntry, MemoryQuery};
pub use task::{Task, TaskStatus, TaskStore, TaskUpdate};
pub use channel::Notifier;
pub use effort::Effort;
pub use human_input::{HumanInputGate, PendingQuestion};
pub use event::{DomainEvent, EventBus};
