//! `shrimp run`: one query through the agent loop.

use shrimp_agent::{AgentRunner, ProgressCallback, spawn_stale_question_sweeper};
use shrimp_channels::{ConsoleNotifier, TelegramNotifier, spawn_stdin_responder};
use shrimp_config::AppConfig;
use shrimp_core::error::ChannelError;
use shrimp_core::task::{TaskStatus, TaskStore, TaskUpdate};
use shrimp_core::{DomainEvent, Effort, EventBus, HumanInputGate, MemoryBackend, Notifier, ToolContext};
use shrimp_memory::{InMemoryBackend, InMemoryTaskStore, NoopMemory};
use shrimp_providers::{ModelSelector, OpenRouterProvider};
use shrimp_tools::{ToolDeps, default_registry};
use std::sync::Arc;
use std::time::Duration;

/// User ids for the in-process task store.
const HUMAN_USER_ID: i64 = 1;
const AGENT_USER_ID: i64 = 2;

pub struct RunOptions {
    pub effort: Effort,
    pub session: String,
    pub telegram: bool,
    /// Archive research results into memory
    pub archive: bool,
}

pub async fn run(query: String, opts: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let RunOptions {
        effort,
        session,
        telegram,
        archive,
    } = opts;
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
        eprintln!("    OPENAI_API_KEY=sk-...             (OpenAI-compatible endpoint)");
        eprintln!("    OPENSHRIMP_API_KEY=...            (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let notifier: Arc<dyn Notifier> = if telegram {
        let tg = TelegramNotifier::from_config(&config)?
            .ok_or("--telegram needs telegram.bot_token or TELEGRAM_BOT_TOKEN")?;
        Arc::new(tg)
    } else {
        Arc::new(ConsoleNotifier::new())
    };

    let events = Arc::new(EventBus::default());
    let provider = OpenRouterProvider::new(
        config.base_url.clone(),
        api_key,
        Duration::from_secs(config.llm_timeout_secs),
    )?;
    let selector = Arc::new(
        ModelSelector::from_config(Arc::new(provider), &config).with_events(events.clone()),
    );

    let gate = Arc::new(HumanInputGate::new());
    let memory: Arc<dyn MemoryBackend> = if archive {
        Arc::new(InMemoryBackend::new())
    } else {
        Arc::new(NoopMemory)
    };
    let tasks = Arc::new(InMemoryTaskStore::new());
    let tools = default_registry(
        ToolDeps {
            gate: gate.clone(),
            notifier: notifier.clone(),
            memory: memory.clone(),
            tasks: Some(tasks.clone()),
        },
        &config,
    )?;

    let runner = AgentRunner::new(selector, Arc::new(tools), config.agent.clone())
        .with_memory(memory)
        .with_task_store(tasks.clone())
        .with_events(events.clone());

    let task = tasks.create_task(&query).await;
    tasks
        .update_task(
            task.id,
            TaskUpdate::default()
                .status(TaskStatus::InProgress)
                .assignee(Some(AGENT_USER_ID)),
        )
        .await?;
    let ctx = ToolContext::for_session(session.clone())
        .with_task(task.id)
        .with_users(HUMAN_USER_ID, AGENT_USER_ID);

    let responder = (!telegram).then(|| spawn_stdin_responder(gate.clone(), session.clone()));
    let sweeper = spawn_stale_question_sweeper(
        gate.clone(),
        notifier.clone(),
        Duration::from_secs(config.human_input.sweep_interval_secs),
        Duration::from_secs(config.human_input.stale_after_secs),
    );
    let watcher = {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let DomainEvent::FallbackModelUsed { primary, fallback, .. } = event.as_ref() {
                    eprintln!("  ↪ {primary} failed, using {fallback}");
                }
            }
        })
    };

    let progress: ProgressCallback = Arc::new(
        |tool: &str, _args: &serde_json::Value, _observation: &str| -> Result<(), ChannelError> {
            eprintln!("  🔧 {tool}");
            Ok(())
        },
    );

    eprintln!("  Thinking... (effort: {effort})");
    let result = runner.run(&query, effort, &ctx, Some(progress)).await;

    sweeper.abort();
    watcher.abort();
    if let Some(responder) = responder {
        responder.abort();
    }

    let (status, note) = match &result {
        Ok(outcome) if outcome.hit_limit => (TaskStatus::Completed, "Hit tool-call limit".to_string()),
        Ok(_) => (TaskStatus::Completed, "Done".to_string()),
        Err(e) => (TaskStatus::Failed, e.to_string()),
    };
    if let Err(e) = tasks
        .update_task(task.id, TaskUpdate::default().status(status).note(note))
        .await
    {
        tracing::warn!(task_id = task.id, error = %e, "Failed to record task outcome");
    }

    let outcome = result?;
    println!("{}", outcome.answer);
    Ok(())
}
