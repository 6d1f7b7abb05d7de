//! Built-in tool implementations for openshrimp.
//!
//! - `ask_human`: ask the user and wait for the reply
//! - `notify_user`: send an interim update
//! - `memory_add` / `memory_search`: long-term memory
//! - `web_fetch`: read a page (tagged `research`)
//! - `get_task` / `update_task`: read and close out the tracked task

pub mod ask_human;
pub mod memory_add;
pub mod memory_search;
pub mod notify;
pub mod task_tracking;
pub mod web_fetch;

use shrimp_config::AppConfig;
use shrimp_core::error::ToolError;
use shrimp_core::memory::MemoryBackend;
use shrimp_core::task::TaskStore;
use shrimp_core::tool::{RESEARCH_TAG, ToolRegistry};
use shrimp_core::{HumanInputGate, Notifier};
use std::sync::Arc;
use std::time::Duration;

pub use ask_human::AskHumanTool;
pub use memory_add::MemoryAddTool;
pub use memory_search::MemorySearchTool;
pub use notify::NotifyUserTool;
pub use task_tracking::{GetTaskTool, UpdateTaskTool};
pub use web_fetch::WebFetchTool;

/// Shared services the built-in tools are wired to.
#[derive(Clone)]
pub struct ToolDeps {
    pub gate: Arc<HumanInputGate>,
    pub notifier: Arc<dyn Notifier>,
    pub memory: Arc<dyn MemoryBackend>,
    pub tasks: Option<Arc<dyn TaskStore>>,
}

/// Build the registry with every built-in tool.
pub fn default_registry(deps: ToolDeps, config: &AppConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();

    let mut ask = AskHumanTool::new(deps.gate, deps.notifier.clone())
        .with_max_asks_per_task(config.human_input.max_asks_per_task)
        .with_default_timeout(Duration::from_secs(config.human_input.default_timeout_secs));
    if let Some(tasks) = deps.tasks {
        ask = ask.with_task_store(tasks.clone());
        registry.register(Box::new(GetTaskTool::new(tasks.clone())));
        registry.register(Box::new(UpdateTaskTool::new(tasks)));
    }
    registry.register(Box::new(ask));
    registry.register(Box::new(NotifyUserTool::new(deps.notifier)));
    registry.register(Box::new(MemoryAddTool::new(deps.memory.clone())));
    registry.register(Box::new(MemorySearchTool::new(deps.memory)));
    registry.register_tagged(
        Box::new(WebFetchTool::new(Duration::from_secs(30))?),
        [RESEARCH_TAG],
    );

    Ok(registry)
}
