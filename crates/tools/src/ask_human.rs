//! `ask_human`: pause the Run until the user answers in chat.
//!
//! The question goes out through the [`Notifier`], the owning task is
//! parked as `waiting_for_human`, and the Run's task blocks on the
//! [`HumanInputGate`] until the chat front end resolves it or the timeout
//! passes. A timeout is an ordinary observation, never an error.

use async_trait::async_trait;
use shrimp_core::error::ToolError;
use shrimp_core::task::{TaskStatus, TaskStore, TaskUpdate};
use shrimp_core::tool::{Tool, ToolContext, ToolResult};
use shrimp_core::{HumanInputGate, Notifier};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

pub const NO_ANSWER: &str = "(no answer — user did not reply within the timeout)";
pub const NO_SESSION: &str = "[human_input] No active chat session — cannot ask question.";

/// Per-task ask counts are trimmed past this many tasks.
const MAX_TRACKED_TASKS: usize = 500;

pub struct AskHumanTool {
    gate: Arc<HumanInputGate>,
    notifier: Arc<dyn Notifier>,
    tasks: Option<Arc<dyn TaskStore>>,
    max_asks_per_task: u32,
    default_timeout: Duration,
    asks: Mutex<HashMap<i64, u32>>,
}

impl AskHumanTool {
    pub fn new(gate: Arc<HumanInputGate>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            gate,
            notifier,
            tasks: None,
            max_asks_per_task: 2,
            default_timeout: Duration::from_secs(600),
            asks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_task_store(mut self, tasks: Arc<dyn TaskStore>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn with_max_asks_per_task(mut self, max: u32) -> Self {
        self.max_asks_per_task = max;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Reserve one question for `task_id`; `false` once the cap is hit.
    fn try_reserve(&self, task_id: i64) -> bool {
        let mut asks = self.asks.lock().unwrap_or_else(|p| p.into_inner());
        if asks.len() > MAX_TRACKED_TASKS {
            let mut ids: Vec<i64> = asks.keys().copied().collect();
            ids.sort_unstable();
            for id in &ids[..ids.len() / 2] {
                asks.remove(id);
            }
        }
        let count = asks.entry(task_id).or_insert(0);
        if *count >= self.max_asks_per_task {
            return false;
        }
        *count += 1;
        true
    }

    async fn update_task(&self, task_id: Option<i64>, update: TaskUpdate) {
        let (Some(tasks), Some(id)) = (&self.tasks, task_id) else {
            return;
        };
        if let Err(e) = tasks.update_task(id, update).await {
            warn!(task_id = id, error = %e, "Task update failed around ask_human");
        }
    }
}

#[async_trait]
impl Tool for AskHumanTool {
    fn name(&self) -> &str {
        "ask_human"
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for their reply. Use this ONLY when you cannot \
         proceed without user input: ambiguous personal preferences, missing credentials, \
         or requirements that searching cannot resolve. Do NOT use it for factual questions, \
         confirmations, or 'should I continue?' checks."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the user"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "How long to wait for a reply (default 600)",
                    "default": 600
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let question = arguments["question"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'question' argument".into()))?;
        let timeout = arguments["timeout_seconds"]
            .as_u64()
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let Some(session_id) = ctx.session_id.as_deref() else {
            return Ok(ToolResult::ok(NO_SESSION));
        };

        if let Some(task_id) = ctx.task_id {
            if !self.try_reserve(task_id) {
                info!(task_id, max = self.max_asks_per_task, "ask_human cap reached");
                return Ok(ToolResult::ok(format!(
                    "(Question not sent — maximum of {} questions per task reached. \
                     Proceed with your best judgment based on available information.)",
                    self.max_asks_per_task
                )));
            }
        }

        self.update_task(
            ctx.task_id,
            TaskUpdate::default()
                .status(TaskStatus::WaitingForHuman)
                .assignee(ctx.human_user_id)
                .pending_question(Some(question.to_string())),
        )
        .await;

        let pending = self.gate.register(session_id, question, ctx.task_id);

        if let Err(e) = self
            .notifier
            .send_message(session_id, &format!("❓ {question}"))
            .await
        {
            warn!(session = %session_id, error = %e, "Failed to deliver question");
        }

        let answer = pending.wait(timeout).await;

        self.update_task(
            ctx.task_id,
            TaskUpdate::default()
                .status(TaskStatus::InProgress)
                .assignee(ctx.agent_user_id)
                .pending_question(None),
        )
        .await;

        self.gate.release(&pending);

        match answer {
            Some(answer) if !answer.is_empty() => Ok(ToolResult::ok(answer)),
            _ => {
                info!(session = %session_id, "No answer before timeout");
                Ok(ToolResult::ok(NO_ANSWER))
            }
        }
    }
}
