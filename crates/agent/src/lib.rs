//! The governed agent loop.
//!
//! A Run alternates between an LLM call and a batch of tool calls until
//! the model answers in plain text:
//!
//! 1. **Resolve effort**: the requested tier, upgraded to `deep` when the
//!    query asks for deep research
//! 2. **Call the LLM** with a system directive carrying the remaining
//!    tool budget
//! 3. **Execute tools** in order, each one passed through the loop
//!    governor first
//! 4. **Repeat** until a text reply, or summarize the evidence when the
//!    step ceiling is reached

pub mod effort;
pub mod executor;
pub mod governor;
pub mod prompt;
pub mod runner;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use effort::{is_deep_research, resolve_effort};
pub use executor::{ObservationStatus, ProgressCallback, ToolExecutor, ToolObservation, truncate_observation};
pub use governor::{Governor, LoopSignal, Verdict, call_hash, canonical_json};
pub use runner::{AgentRunner, LIMIT_NOTICE, NOTHING_GATHERED, RunOutcome, step_ceiling};
pub use sweeper::spawn_stale_question_sweeper;
