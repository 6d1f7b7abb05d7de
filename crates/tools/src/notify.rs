//! `notify_user`: push an interim update to the chat session.

use async_trait::async_trait;
use shrimp_core::error::ToolError;
use shrimp_core::tool::{Tool, ToolContext, ToolResult};
use shrimp_core::Notifier;
use std::sync::Arc;

pub struct NotifyUserTool {
    notifier: Arc<dyn Notifier>,
}

impl NotifyUserTool {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Tool for NotifyUserTool {
    fn name(&self) -> &str {
        "notify_user"
    }

    fn description(&self) -> &str {
        "Send a short progress update to the user while you keep working. \
         Use it to share intermediate findings; it does not wait for a reply."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to send"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let message = arguments["message"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'message' argument".into()))?;

        let Some(session_id) = ctx.session_id.as_deref() else {
            return Ok(ToolResult::ok(
                "[notify_user] No active chat session — message not sent.",
            ));
        };

        match self.notifier.send_message(session_id, message).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "[notify_user] Message sent via {}.",
                self.notifier.name()
            ))),
            Err(e) => Ok(ToolResult::failure(format!(
                "[notify_user] Failed to send message: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrimp_core::error::ChannelError;

    struct DownNotifier;

    #[async_trait]
    impl Notifier for DownNotifier {
        fn name(&self) -> &str {
            "down"
        }

        async fn send_message(&self, _session_id: &str, _text: &str) -> Result<(), ChannelError> {
            Err(ChannelError::DeliveryFailed {
                channel: "down".into(),
                reason: "503".into(),
            })
        }
    }

    #[tokio::test]
    async fn headless_run_is_noop() {
        let tool = NotifyUserTool::new(Arc::new(DownNotifier));
        let result = tool
            .execute(serde_json::json!({"message": "hi"}), &ToolContext::default())
            .await
            .unwrap();
        assert!(result.output.contains("No active chat session"));
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_not_raised() {
        let tool = NotifyUserTool::new(Arc::new(DownNotifier));
        let result = tool
            .execute(
                serde_json::json!({"message": "hi"}),
                &ToolContext::for_session("chat-1"),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("Failed to send"));
    }
}
