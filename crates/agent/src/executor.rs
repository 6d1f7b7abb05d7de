//! Tool execution step.
//!
//! Runs one assistant turn's tool calls in order and folds every failure
//! mode (unknown tool, tool error, governor block) into an observation
//! string. Nothing in here returns an error to the loop.

use crate::governor::{Governor, Verdict};
use serde_json::Value;
use shrimp_core::memory::{MemoryBackend, MemoryEntry};
use shrimp_core::task::TaskStore;
use shrimp_core::tool::{RESEARCH_TAG, ToolCall, ToolContext, ToolRegistry};
use shrimp_core::error::ChannelError;
use shrimp_core::{DomainEvent, EventBus, Message, MessageToolCall};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Called after each tool with `(tool_name, args, raw_observation)`.
/// An `Err` is logged and the batch carries on.
pub type ProgressCallback =
    Arc<dyn Fn(&str, &Value, &str) -> Result<(), ChannelError> + Send + Sync>;

/// Tag put on auto-archived research results.
pub const AUTO_ARCHIVE_TAG: &str = "auto-archived";

/// Observations starting with these are never archived.
const ERROR_PREFIXES: [&str; 3] = ["Tool error", "Unknown tool", "BLOCKED"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationStatus {
    Ok,
    /// The tool ran but reported failure.
    Failed,
    /// The tool returned an error.
    Error,
    Blocked,
    UnknownTool,
}

/// The outcome of one tool call, before truncation.
#[derive(Debug, Clone)]
pub struct ToolObservation {
    pub call_id: String,
    pub tool_name: String,
    pub status: ObservationStatus,
    pub body: String,
}

/// Cut `text` to `max_chars` characters and note how much was dropped.
/// Text within the limit is returned unchanged.
pub fn truncate_observation(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!(
        "{kept}\n\n[... truncated {} chars]",
        group_thousands(total - max_chars)
    )
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Tool arguments arrive as a JSON string; anything unparsable becomes `{}`.
pub fn parse_arguments(call: &MessageToolCall) -> Value {
    if call.arguments.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str::<Value>(&call.arguments) {
        Ok(Value::Null) => Value::Object(Default::default()),
        Ok(value) => value,
        Err(e) => {
            warn!(tool = %call.name, error = %e, "Unparsable tool arguments, using {{}}");
            Value::Object(Default::default())
        }
    }
}

/// Executes tool batches against a shared registry.
pub struct ToolExecutor {
    tools: Arc<ToolRegistry>,
    memory: Option<Arc<dyn MemoryBackend>>,
    tasks: Option<Arc<dyn TaskStore>>,
    events: Option<Arc<EventBus>>,
    max_chars: usize,
    archive_max_chars: usize,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            memory: None,
            tasks: None,
            events: None,
            max_chars: 15_000,
            archive_max_chars: 12_000,
        }
    }

    /// Archive research results here.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryBackend>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Stamp heartbeats here after each batch.
    pub fn with_task_store(mut self, tasks: Arc<dyn TaskStore>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_limits(mut self, max_chars: usize, archive_max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self.archive_max_chars = archive_max_chars;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run every call in order and return one tool-result message per call,
    /// in the same order.
    pub async fn execute_batch(
        &self,
        calls: &[MessageToolCall],
        governor: &mut Governor,
        ctx: &ToolContext,
        progress: Option<&ProgressCallback>,
    ) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let args = parse_arguments(call);
            let observation = self.execute_one(call, &args, governor, ctx).await;

            results.push(Message::tool_result(
                &observation.call_id,
                truncate_observation(&observation.body, self.max_chars),
            ));

            if let Some(cb) = progress {
                if let Err(e) = cb(&call.name, &args, &observation.body) {
                    warn!(tool = %call.name, error = %e, "Progress callback failed");
                }
            }
        }

        self.heartbeat(ctx).await;
        results
    }

    async fn execute_one(
        &self,
        call: &MessageToolCall,
        args: &Value,
        governor: &mut Governor,
        ctx: &ToolContext,
    ) -> ToolObservation {
        let observe = |status, body: String| ToolObservation {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            status,
            body,
        };

        if self.tools.get(&call.name).is_none() {
            warn!(tool = %call.name, "Unknown tool");
            return observe(
                ObservationStatus::UnknownTool,
                format!("Unknown tool: {}", call.name),
            );
        }

        let verdict = governor.check(&call.name, args);
        if let Verdict::Block { signal, count, message } = verdict {
            self.publish(DomainEvent::ToolCallBlocked {
                tool_name: call.name.clone(),
                count,
                reason: signal.as_str().to_string(),
                timestamp: chrono::Utc::now(),
            });
            return observe(ObservationStatus::Blocked, message);
        }

        info!(tool = %call.name, args = %args, "Invoking tool");
        let started = Instant::now();
        let request = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: args.clone(),
        };
        let (status, mut body) = match self.tools.execute(&request, ctx).await {
            Ok(result) if result.success => (ObservationStatus::Ok, result.output),
            Ok(result) => (ObservationStatus::Failed, result.output),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                (ObservationStatus::Error, format!("Tool error: {e}"))
            }
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            tool = %call.name,
            duration_ms,
            result_len = body.len(),
            "Tool finished"
        );
        self.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: status == ObservationStatus::Ok,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });

        if let Verdict::Warn { suffix, .. } = verdict {
            body.push_str(&suffix);
        }

        let observation = observe(status, body);
        if self.tools.has_tag(&call.name, RESEARCH_TAG) {
            self.archive(&observation, args).await;
        }
        observation
    }

    /// Best-effort copy of a research result into long-term memory.
    async fn archive(&self, observation: &ToolObservation, args: &Value) {
        let Some(memory) = &self.memory else {
            return;
        };
        if observation.status != ObservationStatus::Ok {
            return;
        }
        let body = observation.body.trim();
        if body.is_empty() || ERROR_PREFIXES.iter().any(|p| body.starts_with(p)) {
            return;
        }

        let content: String = body.chars().take(self.archive_max_chars).collect();
        let source = args.get("url").and_then(Value::as_str).unwrap_or_default();
        let entry = MemoryEntry::new(content)
            .with_source(source)
            .with_tag(AUTO_ARCHIVE_TAG);

        match memory.store(entry).await {
            Ok(id) => debug!(tool = %observation.tool_name, memory_id = %id, "Archived research result"),
            Err(e) => warn!(tool = %observation.tool_name, error = %e, "Auto-archive failed"),
        }
    }

    async fn heartbeat(&self, ctx: &ToolContext) {
        let (Some(tasks), Some(task_id)) = (&self.tasks, ctx.task_id) else {
            return;
        };
        if let Err(e) = tasks.update_heartbeat(task_id).await {
            warn!(task_id, error = %e, "Heartbeat update failed");
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
