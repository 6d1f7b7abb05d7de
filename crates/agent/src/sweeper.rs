//! Periodic reminders for questions nobody has answered yet.

use shrimp_core::{HumanInputGate, Notifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Re-send every question pending longer than `threshold`, every `interval`.
///
/// Observational only: the gate's state is never changed. Abort the handle
/// to stop the sweeper.
pub fn spawn_stale_question_sweeper(
    gate: Arc<HumanInputGate>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    threshold: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            remind_stale(&gate, notifier.as_ref(), threshold).await;
        }
    })
}

/// One sweep. Returns how many reminders were delivered.
pub async fn remind_stale(gate: &HumanInputGate, notifier: &dyn Notifier, threshold: Duration) -> usize {
    let mut sent = 0;
    for pending in gate.stale(threshold) {
        let text = format!("⏳ Still waiting for your answer: {}", pending.question);
        match notifier.send_message(&pending.session_id, &text).await {
            Ok(()) => sent += 1,
            Err(e) => warn!(session = %pending.session_id, error = %e, "Reminder failed"),
        }
    }
    if sent > 0 {
        debug!(sent, "Sent stale-question reminders");
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shrimp_core::error::ChannelError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_message(&self, session_id: &str, text: &str) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((session_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_old_questions_are_reminded() {
        let gate = HumanInputGate::new();
        let notifier = RecordingNotifier::default();

        gate.register("chat-1", "Which plan?", Some(3));
        tokio::time::advance(Duration::from_secs(400)).await;
        gate.register("chat-2", "Budget?", None);

        let sent = remind_stale(&gate, &notifier, Duration::from_secs(300)).await;
        assert_eq!(sent, 1);
        let log = notifier.sent.lock().unwrap();
        assert_eq!(log[0].0, "chat-1");
        assert_eq!(log[0].1, "⏳ Still waiting for your answer: Which plan?");
        // Reminders never resolve or remove the question.
        assert!(gate.has_pending("chat-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_fires_on_interval() {
        let gate = Arc::new(HumanInputGate::new());
        let notifier = Arc::new(RecordingNotifier::default());
        gate.register("chat-1", "Still there?", None);

        let handle = spawn_stale_question_sweeper(
            gate.clone(),
            notifier.clone(),
            Duration::from_secs(60),
            Duration::from_secs(30),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);

        handle.abort();
    }
}
