//! Task-tracking contract.
//!
//! Tasks are persisted by an external store; the agent only flips status
//! and assignee around human-input waits and stamps a heartbeat so a
//! watchdog can tell a live Run from a dead one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::error::TaskStoreError;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    WaitingForHuman,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::WaitingForHuman => "waiting_for_human",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "waiting_for_human" => Ok(Self::WaitingForHuman),
            other => Err(TaskStoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// A tracked task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
    /// Question the agent is blocked on; the durable crash-recovery signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_question: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A partial update. `None` leaves the field untouched; the nested
/// `Option`s let callers clear `assignee_id` / `pending_question`.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<Option<i64>>,
    pub pending_question: Option<Option<String>>,
    pub note: Option<String>,
}

impl TaskUpdate {
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn assignee(mut self, assignee_id: Option<i64>) -> Self {
        self.assignee_id = Some(assignee_id);
        self
    }

    pub fn pending_question(mut self, question: Option<String>) -> Self {
        self.pending_question = Some(question);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// External task-tracking store.
///
/// The agent issues single-row calls only; transaction discipline is the
/// store's business.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn update_task(&self, id: i64, update: TaskUpdate) -> Result<Task, TaskStoreError>;

    async fn get_task(&self, id: i64) -> Result<Option<Task>, TaskStoreError>;

    /// Liveness stamp for watchdogs.
    async fn update_heartbeat(&self, id: i64) -> Result<(), TaskStoreError>;
}
