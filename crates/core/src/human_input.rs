//! Human-input gate: parks a Run until a human answers out of band.
//!
//! `ask_human` registers a [`PendingQuestion`] keyed by chat session and
//! waits on it; the chat front end calls [`HumanInputGate::resolve`] when
//! the user replies. Each question is a single-slot rendezvous: one writer
//! (`resolve`), one waiter, never a broadcast.
//!
//! State is in-memory only and lost on restart. The owning task's
//! `pending_question` field is the durable recovery signal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// One outstanding question.
#[derive(Debug)]
pub struct PendingQuestion {
    pub session_id: String,
    pub question: String,
    pub task_id: Option<i64>,
    pub created_at: Instant,
    answer: OnceLock<String>,
    wake: Notify,
}

impl PendingQuestion {
    fn new(session_id: String, question: String, task_id: Option<i64>) -> Self {
        Self {
            session_id,
            question,
            task_id,
            created_at: Instant::now(),
            answer: OnceLock::new(),
            wake: Notify::new(),
        }
    }

    /// The recorded answer, if any.
    pub fn answer(&self) -> Option<&str> {
        self.answer.get().map(String::as_str)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Wait up to `timeout` for an answer.
    ///
    /// Returns `None` on timeout. An answer recorded before the wait starts
    /// is returned immediately (`notify_one` leaves a permit behind).
    pub async fn wait(&self, timeout: Duration) -> Option<String> {
        if let Some(answer) = self.answer.get() {
            return Some(answer.clone());
        }
        // A resolve racing the deadline still wins if the slot got filled.
        let _ = tokio::time::timeout(timeout, self.wake.notified()).await;
        self.answer.get().cloned()
    }
}

/// Registry of pending questions, one per session.
///
/// The mutex guards only the session index and is never held across an
/// await, so a waiting Run never blocks `register` or `resolve`.
#[derive(Debug, Default)]
pub struct HumanInputGate {
    pending: Mutex<HashMap<String, Arc<PendingQuestion>>>,
}

impl HumanInputGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self) -> MutexGuard<'_, HashMap<String, Arc<PendingQuestion>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a question for `session_id`.
    ///
    /// A previous question for the same session is replaced but not woken;
    /// its waiter times out on its own.
    pub fn register(
        &self,
        session_id: impl Into<String>,
        question: impl Into<String>,
        task_id: Option<i64>,
    ) -> Arc<PendingQuestion> {
        let pq = Arc::new(PendingQuestion::new(session_id.into(), question.into(), task_id));
        let replaced = self.index().insert(pq.session_id.clone(), Arc::clone(&pq));
        debug!(
            session = %pq.session_id,
            task_id = ?task_id,
            superseded = replaced.is_some(),
            "Registered pending question"
        );
        pq
    }

    /// Deliver `answer` to the session's current question and wake its waiter.
    ///
    /// Returns `false` if nothing is pending or the question was already
    /// answered; the first answer always stands.
    pub fn resolve(&self, session_id: &str, answer: impl Into<String>) -> bool {
        let Some(pq) = self.index().get(session_id).cloned() else {
            return false;
        };
        if pq.answer.set(answer.into()).is_err() {
            debug!(session = %session_id, "Question already answered, ignoring reply");
            return false;
        }
        pq.wake.notify_one();
        debug!(session = %session_id, "Resolved pending question");
        true
    }

    pub fn has_pending(&self, session_id: &str) -> bool {
        self.index().contains_key(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<PendingQuestion>> {
        self.index().get(session_id).cloned()
    }

    /// All questions older than `older_than`.
    pub fn stale(&self, older_than: Duration) -> Vec<Arc<PendingQuestion>> {
        self.index()
            .values()
            .filter(|pq| pq.age() > older_than)
            .cloned()
            .collect()
    }

    /// Drop whatever question is registered for `session_id`.
    pub fn cleanup(&self, session_id: &str) -> bool {
        self.index().remove(session_id).is_some()
    }

    /// Drop `pq` only if it is still the session's current question.
    pub fn release(&self, pq: &Arc<PendingQuestion>) -> bool {
        let mut index = self.index();
        match index.get(&pq.session_id) {
            Some(current) if Arc::ptr_eq(current, pq) => {
                index.remove(&pq.session_id);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index().is_empty()
    }
}
