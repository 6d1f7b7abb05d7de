//! In-memory task tracker.
//!
//! Holds the task rows the agent updates while it works: status, assignee,
//! the pending human question and a liveness heartbeat. Startup recovery
//! helpers mirror what a persistent store would run after a crash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shrimp_core::error::TaskStoreError;
use shrimp_core::task::{Task, TaskStatus, TaskStore, TaskUpdate};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<BTreeMap<i64, Task>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `pending` task and return it.
    pub async fn create_task(&self, title: impl Into<String>) -> Task {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let task = Task {
            id,
            title: title.into(),
            status: TaskStatus::Pending,
            assignee_id: None,
            pending_question: None,
            notes: Vec::new(),
            heartbeat_at: None,
            updated_at: Utc::now(),
        };
        self.tasks.write().await.insert(id, task.clone());
        task
    }

    pub async fn list_tasks(&self) -> Vec<Task> {
        self.tasks.read().await.values().cloned().collect()
    }

    /// Fail every task left waiting on a human. Run once at startup: the
    /// in-memory question registry did not survive the restart.
    pub async fn reset_waiting_tasks(&self) -> usize {
        let mut tasks = self.tasks.write().await;
        let now = Utc::now();
        let mut reset = 0;
        for task in tasks
            .values_mut()
            .filter(|t| t.status == TaskStatus::WaitingForHuman)
        {
            task.status = TaskStatus::Failed;
            task.assignee_id = None;
            task.pending_question = None;
            task.updated_at = now;
            reset += 1;
        }
        if reset > 0 {
            info!(count = reset, "Failed tasks left waiting for a human");
        }
        reset
    }

    /// Return `in_progress` tasks without a heartbeat in `timeout` to `pending`.
    pub async fn reset_stale_in_progress(&self, timeout: Duration) -> usize {
        match chrono::Duration::from_std(timeout) {
            Ok(timeout) => self.reset_stale_before(Utc::now() - timeout).await,
            Err(_) => 0,
        }
    }

    /// Return `in_progress` tasks last seen before `cutoff` to `pending`.
    /// Tasks that never sent a heartbeat are judged by `updated_at`.
    pub async fn reset_stale_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut tasks = self.tasks.write().await;
        let now = Utc::now();
        let mut reset = 0;
        for task in tasks.values_mut().filter(|t| {
            t.status == TaskStatus::InProgress && t.heartbeat_at.unwrap_or(t.updated_at) < cutoff
        }) {
            warn!(
                task_id = task.id,
                title = %task.title,
                heartbeat = ?task.heartbeat_at,
                "Resetting stale in-progress task"
            );
            task.status = TaskStatus::Pending;
            task.updated_at = now;
            reset += 1;
        }
        reset
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn update_task(&self, id: i64, update: TaskUpdate) -> Result<Task, TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;

        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(assignee) = update.assignee_id {
            task.assignee_id = assignee;
        }
        if let Some(question) = update.pending_question {
            task.pending_question = question;
        }
        if let Some(note) = update.note {
            task.notes.push(note);
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>, TaskStoreError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update_heartbeat(&self, id: i64) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;
        if task.status == TaskStatus::InProgress {
            let now = Utc::now();
            task.heartbeat_at = Some(now);
            task.updated_at = now;
        }
        Ok(())
    }
}
