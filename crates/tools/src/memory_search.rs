//! `memory_search`: search long-term memory, including auto-archived
//! research results.

use async_trait::async_trait;
use shrimp_core::error::ToolError;
use shrimp_core::memory::{MemoryBackend, MemoryQuery};
use shrimp_core::tool::{Tool, ToolContext, ToolResult};
use std::sync::Arc;

pub struct MemorySearchTool {
    backend: Arc<dyn MemoryBackend>,
}

impl MemorySearchTool {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[derive(serde::Serialize)]
struct MemoryResult {
    id: String,
    content: String,
    score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    created_at: String,
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search long-term memory for facts and pages gathered earlier. \
         Check here before researching something again."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let limit = arguments["limit"].as_u64().unwrap_or(5).clamp(1, 50) as usize;

        let entries = match self
            .backend
            .search(MemoryQuery::new(query).with_limit(limit))
            .await
        {
            Ok(entries) => entries,
            Err(e) => return Ok(ToolResult::failure(format!("Memory search failed: {e}"))),
        };

        if entries.is_empty() {
            return Ok(ToolResult::ok(format!("No memories found matching '{query}'.")));
        }

        let results: Vec<MemoryResult> = entries
            .into_iter()
            .map(|e| MemoryResult {
                id: e.id,
                content: e.content,
                score: e.score,
                source: e.source,
                created_at: e.created_at.to_rfc3339(),
            })
            .collect();
        let output = serde_json::to_string_pretty(&results)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "memory_search".into(),
                reason: e.to_string(),
            })?;
        Ok(ToolResult::ok(output))
    }
}
