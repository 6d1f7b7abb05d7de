//! LLM provider implementations for openshrimp.
//!
//! [`OpenRouterProvider`] implements `shrimp_core::Provider` over the
//! OpenAI-compatible chat completions API. [`ModelSelector`] maps an
//! effort tier to a primary and fallback model and fails over once on
//! transient errors.

pub mod openrouter;
pub mod selector;

pub use openrouter::OpenRouterProvider;
pub use selector::{Completion, ModelChoice, ModelSelector, is_transient};
