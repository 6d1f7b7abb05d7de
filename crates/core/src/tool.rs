//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act: fetch pages, ask the
//! human, store findings in memory, message the user. Each tool is
//! registered with a set of tags (e.g. `"research"`) that the agent loop
//! consults for cross-cutting behavior such as auto-archiving results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Tag marking tools whose output should be archived into long-term memory.
pub const RESEARCH_TAG: &str = "research";

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { success: true, output: output.into() }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self { success: false, output: output.into() }
    }
}

/// Per-Run context handed to every tool invocation.
///
/// Carries the chat session and task the Run belongs to, so tools such as
/// `ask_human` never have to look up "current" state from anywhere else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolContext {
    /// Chat/session the Run was started from (None for headless runs)
    pub session_id: Option<String>,

    /// Task the Run is working on
    pub task_id: Option<i64>,

    /// User that owns the task while the agent waits on a human
    pub human_user_id: Option<i64>,

    /// User the task is assigned back to while the agent works
    pub agent_user_id: Option<i64>,
}

impl ToolContext {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn with_task(mut self, task_id: i64) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_users(mut self, human_user_id: i64, agent_user_id: i64) -> Self {
        self.human_user_id = Some(human_user_id);
        self.agent_user_id = Some(agent_user_id);
        self
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "ask_human", "web_fetch").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

struct RegisteredTool {
    tool: Box<dyn Tool>,
    tags: Vec<String>,
}

/// A registry of available tools and their tags.
///
/// Populated once at startup and shared read-only (behind an `Arc`) by all
/// concurrent Runs.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register an untagged tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.register_tagged(tool, Vec::<String>::new());
    }

    /// Register a tool with a tag set.
    pub fn register_tagged<S: Into<String>>(
        &mut self,
        tool: Box<dyn Tool>,
        tags: impl IntoIterator<Item = S>,
    ) {
        let name = tool.name().to_string();
        let tags = tags.into_iter().map(Into::into).collect();
        self.tools.insert(name, RegisteredTool { tool, tags });
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.tool.as_ref())
    }

    /// Tags registered for `name` (empty for unknown tools).
    pub fn tags(&self, name: &str) -> &[String] {
        self.tools.get(name).map(|t| t.tags.as_slice()).unwrap_or(&[])
    }

    /// Whether `name` is registered with `tag`.
    pub fn has_tag(&self, name: &str, tag: &str) -> bool {
        self.tags(name).iter().any(|t| t == tag)
    }

    /// All tool definitions, sorted by name so prompts are stable.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.tool.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool call.
    pub async fn execute(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> std::result::Result<ToolResult, ToolError> {
        let tool = self.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call.arguments.clone(), ctx).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
