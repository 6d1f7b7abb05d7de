//! The orchestration loop.
//!
//! `START → LLM_CALL ⇄ TOOL_EXEC → END`, bounded by a step ceiling of
//! `2 + 2 × max_rounds`. When the ceiling is hit the loop asks the model
//! for a best-effort answer built only from the tool results gathered so
//! far instead of failing the Run.

use crate::effort::resolve_effort;
use crate::executor::{ProgressCallback, ToolExecutor};
use crate::governor::Governor;
use crate::prompt::{count_tool_rounds, system_prompt};
use shrimp_config::AgentConfig;
use shrimp_core::memory::MemoryBackend;
use shrimp_core::message::Role;
use shrimp_core::provider::ToolDefinition;
use shrimp_core::task::TaskStore;
use shrimp_core::tool::{ToolContext, ToolRegistry};
use shrimp_core::{DomainEvent, Effort, EventBus, Message};
use shrimp_providers::{Completion, ModelSelector};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix of every answer produced after the step ceiling was hit.
pub const LIMIT_NOTICE: &str = "⚠️ Hit tool-call limit; here's a summary of what was found:\n\n";

/// Returned when the ceiling is hit before any tool produced output.
pub const NOTHING_GATHERED: &str =
    "Research hit the tool-call limit before gathering enough data to answer.";

/// Transitions allowed for a round budget: one opening call, `max_rounds`
/// tool/LLM pairs and one closing call.
/// Saturates rather than overflowing for absurd budgets.
pub fn step_ceiling(max_rounds: u32) -> u32 {
    max_rounds.saturating_mul(2).saturating_add(2)
}

/// What a finished Run hands back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub answer: String,
    /// Tier after auto-upgrade.
    pub effort: Effort,
    /// Assistant turns that requested tools.
    pub rounds_used: u32,
    /// The step ceiling was hit and `answer` is a partial summary.
    pub hit_limit: bool,
    /// The full transcript, user query first.
    pub transcript: Vec<Message>,
}

/// Drives Runs. Shared read-only state only; every Run gets its own
/// transcript and governor.
pub struct AgentRunner {
    selector: Arc<ModelSelector>,
    executor: ToolExecutor,
    config: AgentConfig,
    events: Option<Arc<EventBus>>,
}

impl AgentRunner {
    pub fn new(selector: Arc<ModelSelector>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        let executor = ToolExecutor::new(tools)
            .with_limits(config.tool_result_max_chars, config.archive_max_chars);
        Self {
            selector,
            executor,
            config,
            events: None,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryBackend>) -> Self {
        self.executor = self.executor.with_memory(memory);
        self
    }

    pub fn with_task_store(mut self, tasks: Arc<dyn TaskStore>) -> Self {
        self.executor = self.executor.with_task_store(tasks);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.executor = self.executor.with_events(events.clone());
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one query to completion.
    ///
    /// Tool failures and governor blocks never surface here; only a model
    /// error that survived failover does.
    pub async fn run(
        &self,
        query: &str,
        effort: Effort,
        ctx: &ToolContext,
        progress: Option<ProgressCallback>,
    ) -> shrimp_core::Result<RunOutcome> {
        let effort = resolve_effort(effort, query);
        let max_rounds = self.config.effort.get(effort).max_rounds;
        let ceiling = step_ceiling(max_rounds);
        let definitions = self.executor.registry().definitions();
        let mut governor = Governor::new(self.config.governor.clone());
        let mut transcript = vec![Message::user(query)];
        let mut steps = 0u32;

        info!(%effort, max_rounds, session = ?ctx.session_id, "Starting run");

        // Steps advance in LLM/tool pairs and the ceiling is even.
        loop {
            if steps >= ceiling {
                break;
            }
            let reply = self
                .llm_call(effort, max_rounds, &transcript, definitions.clone())
                .await?;
            steps += 1;

            if !reply.has_tool_calls() {
                let answer = reply.content.clone();
                transcript.push(reply);
                info!(answer_len = answer.len(), steps, "Run finished");
                return Ok(RunOutcome {
                    answer,
                    effort,
                    rounds_used: count_tool_rounds(&transcript),
                    hit_limit: false,
                    transcript,
                });
            }

            debug!(tool_count = reply.tool_calls.len(), "Executing tool calls");
            let calls = reply.tool_calls.clone();
            transcript.push(reply);
            let results = self
                .executor
                .execute_batch(&calls, &mut governor, ctx, progress.as_ref())
                .await;
            transcript.extend(results);
            steps += 1;
        }

        warn!(
            messages = transcript.len(),
            ceiling, "Step ceiling hit, falling back to summary"
        );
        let answer = self.fallback_summary(query, &transcript).await?;
        Ok(RunOutcome {
            answer,
            effort,
            rounds_used: count_tool_rounds(&transcript),
            hit_limit: true,
            transcript,
        })
    }

    async fn llm_call(
        &self,
        effort: Effort,
        max_rounds: u32,
        transcript: &[Message],
        tools: Vec<ToolDefinition>,
    ) -> shrimp_core::Result<Message> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message::system(system_prompt(effort, max_rounds, transcript)));
        messages.extend_from_slice(transcript);

        let context_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        info!(
            messages = messages.len(),
            context_chars,
            %effort,
            "Calling LLM"
        );

        let completion = self.selector.complete(effort, messages, tools).await?;
        self.record(&completion);
        Ok(completion.response.message)
    }

    /// One extra call answering from the tool results alone.
    async fn fallback_summary(&self, query: &str, transcript: &[Message]) -> shrimp_core::Result<String> {
        let preview = self.config.fallback_preview_chars;
        let gathered: Vec<String> = transcript
            .iter()
            .filter(|m| m.role == Role::Tool && !m.content.is_empty())
            .map(|m| m.content.chars().take(preview).collect())
            .collect();
        if gathered.is_empty() {
            return Ok(NOTHING_GATHERED.to_string());
        }

        let prompt = format!(
            "You were researching the following query but hit the tool-call limit.\n\
             Query: {query}\n\n\
             Here is the information gathered so far:\n\n{}\n\n\
             Based only on this information, give the best answer you can. \
             If you don't have enough to answer fully, say so and share what you found.",
            gathered.join("\n\n---\n\n")
        );
        info!(tool_results = gathered.len(), "Calling LLM for fallback summary");

        let completion = self
            .selector
            .complete(Effort::Normal, vec![Message::user(prompt)], Vec::new())
            .await?;
        self.record(&completion);
        let summary = completion.response.message.content;
        info!(summary_len = summary.len(), "Fallback summary done");
        Ok(format!("{LIMIT_NOTICE}{summary}"))
    }

    fn record(&self, completion: &Completion) {
        let Some(events) = &self.events else {
            return;
        };
        let tokens_used = completion
            .response
            .usage
            .as_ref()
            .map(|u| u.total_tokens)
            .unwrap_or(0);
        events.publish(DomainEvent::ResponseGenerated {
            model: completion.model_used.clone(),
            tokens_used,
            timestamp: chrono::Utc::now(),
        });
    }
}
