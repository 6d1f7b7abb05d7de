//! `get_task` / `update_task`: read and close out the tracked task.
//!
//! Both default to the task the Run is working on (`ToolContext::task_id`).
//! Closing a task as `completed` or `failed` requires a written result.

use async_trait::async_trait;
use shrimp_core::error::ToolError;
use shrimp_core::task::{Task, TaskStatus, TaskStore, TaskUpdate};
use shrimp_core::tool::{Tool, ToolContext, ToolResult};
use std::sync::Arc;

/// Phrases that mark a plan or draft rather than a report of work done.
const SUGGESTION_PHRASES: [&str; 15] = [
    "recommend",
    "suggestion",
    "consider ",
    "you may want",
    "you could",
    "you should",
    "here's what to post",
    "here is what to post",
    "proposed content",
    "draft content",
    "suggested content",
    "post the suggested",
    "post this content",
    "here's a draft",
    "here is a draft",
];

/// Two or more suggestion phrases read as a plan, not an execution report.
pub fn notes_look_like_suggestions(notes: &str) -> bool {
    let lower = notes.to_lowercase();
    SUGGESTION_PHRASES.iter().filter(|p| lower.contains(**p)).count() >= 2
}

fn task_id(arguments: &serde_json::Value, ctx: &ToolContext) -> Result<i64, ToolError> {
    arguments["task_id"]
        .as_i64()
        .or(ctx.task_id)
        .ok_or_else(|| ToolError::InvalidArguments("No 'task_id' given and no active task".into()))
}

fn describe(task: &Task) -> String {
    let mut parts = vec![
        format!("id={}", task.id),
        format!("title={}", task.title),
        format!("status={}", task.status),
    ];
    if let Some(assignee) = task.assignee_id {
        parts.push(format!("assignee_id={assignee}"));
    }
    if let Some(question) = &task.pending_question {
        parts.push(format!("pending_question={question}"));
    }
    let mut out = parts.join(" | ");
    for note in &task.notes {
        out.push_str("\n\n");
        out.push_str(note);
    }
    out
}

pub struct GetTaskTool {
    tasks: Arc<dyn TaskStore>,
}

impl GetTaskTool {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Tool for GetTaskTool {
    fn name(&self) -> &str {
        "get_task"
    }

    fn description(&self) -> &str {
        "Show a task's status, assignee and notes. Defaults to your current task."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "integer",
                    "description": "Task ID (optional; defaults to the current task)"
                }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let id = task_id(&arguments, ctx)?;
        match self.tasks.get_task(id).await {
            Ok(Some(task)) => Ok(ToolResult::ok(describe(&task))),
            Ok(None) => Ok(ToolResult::ok(format!("No task with id={id}."))),
            Err(e) => Ok(ToolResult::failure(format!("[get_task] {e}"))),
        }
    }
}

pub struct UpdateTaskTool {
    tasks: Arc<dyn TaskStore>,
}

impl UpdateTaskTool {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Change a task's status and/or append notes. Marking a task completed or \
         failed requires notes with your final result. Defaults to your current task."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "integer",
                    "description": "Task ID (optional; defaults to the current task)"
                },
                "status": {
                    "type": "string",
                    "enum": ["pending", "in_progress", "completed", "failed"],
                    "description": "New status"
                },
                "notes": {
                    "type": "string",
                    "description": "Text appended to the task; required for completed/failed"
                }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let id = task_id(&arguments, ctx)?;
        let status = arguments["status"]
            .as_str()
            .map(str::parse::<TaskStatus>)
            .transpose()
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let notes = arguments["notes"]
            .as_str()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        if status == Some(TaskStatus::WaitingForHuman) {
            return Ok(ToolResult::failure(
                "Use ask_human to wait for the user; it sets that status itself.",
            ));
        }
        if let Some(closing @ (TaskStatus::Completed | TaskStatus::Failed)) = status {
            let Some(notes) = notes else {
                return Ok(ToolResult::failure(format!(
                    "Cannot set status to '{closing}' without notes. \
                     Provide your final summary in the notes parameter."
                )));
            };
            if closing == TaskStatus::Completed && notes_look_like_suggestions(notes) {
                return Ok(ToolResult::failure(
                    "Cannot mark as completed: the notes describe suggestions rather than \
                     actions you performed. If you only planned the work, mark the task \
                     failed with your suggestions in the notes.",
                ));
            }
        }
        if status.is_none() && notes.is_none() {
            return Err(ToolError::InvalidArguments(
                "Provide 'status', 'notes' or both".into(),
            ));
        }

        let mut update = TaskUpdate::default();
        if let Some(status) = status {
            update = update.status(status);
        }
        if let Some(notes) = notes {
            update = update.note(notes);
        }

        match self.tasks.update_task(id, update).await {
            Ok(task) => Ok(ToolResult::ok(format!(
                "Task id={} updated (status={}).",
                task.id, task.status
            ))),
            Err(e) => Ok(ToolResult::failure(format!("[update_task] {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shrimp_memory::InMemoryTaskStore;

    async fn store_with_task() -> (Arc<InMemoryTaskStore>, i64) {
        let store = Arc::new(InMemoryTaskStore::new());
        let task = store.create_task("compare plans").await;
        (store, task.id)
    }

    #[tokio::test]
    async fn get_defaults_to_current_task() {
        let (store, id) = store_with_task().await;
        let tool = GetTaskTool::new(store);
        let result = tool
            .execute(json!({}), &ToolContext::default().with_task(id))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.starts_with(&format!("id={id} | title=compare plans | status=pending")));
    }

    #[tokio::test]
    async fn get_without_any_task_id_is_invalid() {
        let (store, _) = store_with_task().await;
        let err = GetTaskTool::new(store)
            .execute(json!({}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn get_unknown_task_says_so() {
        let (store, _) = store_with_task().await;
        let result = GetTaskTool::new(store)
            .execute(json!({"task_id": 999}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result.output, "No task with id=999.");
    }

    #[tokio::test]
    async fn failing_a_task_records_notes() {
        let (store, id) = store_with_task().await;
        let tool = UpdateTaskTool::new(store.clone());
        let result = tool
            .execute(
                json!({"status": "failed", "notes": "## Result\nPricing page was down."}),
                &ToolContext::default().with_task(id),
            )
            .await
            .unwrap();
        assert!(result.success, "{}", result.output);

        let task = store.get_task(id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.notes.iter().any(|n| n.contains("Pricing page was down.")));
    }

    #[tokio::test]
    async fn closing_without_notes_is_refused() {
        let (store, id) = store_with_task().await;
        let tool = UpdateTaskTool::new(store.clone());
        let result = tool
            .execute(json!({"task_id": id, "status": "completed", "notes": "  "}), &ToolContext::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("without notes"));
        assert_eq!(store.get_task(id).await.unwrap().unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn suggestions_cannot_complete_a_task() {
        let (store, id) = store_with_task().await;
        let notes = "I recommend the Pro plan. You could also consider Basic.";
        let result = UpdateTaskTool::new(store.clone())
            .execute(
                json!({"task_id": id, "status": "completed", "notes": notes}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(store.get_task(id).await.unwrap().unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn bad_status_and_empty_update_are_invalid() {
        let (store, id) = store_with_task().await;
        let tool = UpdateTaskTool::new(store);
        let ctx = ToolContext::default().with_task(id);

        let err = tool.execute(json!({"status": "done"}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        let err = tool.execute(json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn one_suggestion_phrase_is_not_enough() {
        assert!(!notes_look_like_suggestions("Posted it. I recommend checking tomorrow."));
        assert!(notes_look_like_suggestions("Here's a draft. You should post it."));
    }
}
