//! Console channel: terminal output and stdin replies.
//!
//! Used by `shrimp run`. Messages go to stdout (or any writer, for tests);
//! lines typed on stdin answer whatever question is pending for the
//! session.

use async_trait::async_trait;
use shrimp_core::error::ChannelError;
use shrimp_core::{HumanInputGate, Notifier};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Writes every message as `[session] text`.
pub struct ConsoleNotifier {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn send_message(&self, session_id: &str, text: &str) -> Result<(), ChannelError> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "[{session_id}] {text}")
            .and_then(|_| out.flush())
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "console".into(),
                reason: e.to_string(),
            })
    }
}

/// Resolve `session_id`'s pending question with each stdin line.
///
/// Lines typed while nothing is pending are ignored. Ends on EOF.
pub fn spawn_stdin_responder(gate: Arc<HumanInputGate>, session_id: String) -> JoinHandle<()> {
    tokio::spawn(answer_from_lines(BufReader::new(io::stdin()), gate, session_id))
}

async fn answer_from_lines<R>(reader: R, gate: Arc<HumanInputGate>, session_id: String)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !gate.resolve(&session_id, line) {
            debug!(session = %session_id, "No pending question, ignoring input");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn writes_session_prefixed_lines() {
        let buf = SharedBuf::default();
        let notifier = ConsoleNotifier::with_writer(Box::new(buf.clone()));

        notifier.send_message("cli", "❓ Which plan?").await.unwrap();
        notifier.send_message("cli", "done").await.unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "[cli] ❓ Which plan?\n[cli] done\n");
        assert_eq!(notifier.name(), "console");
    }

    #[tokio::test]
    async fn input_lines_answer_pending_question() {
        let gate = Arc::new(HumanInputGate::new());
        let pending = gate.register("cli", "Basic or Pro?", None);

        let input: &[u8] = b"\n  Pro  \nignored\n";
        answer_from_lines(input, gate.clone(), "cli".into()).await;

        assert_eq!(pending.wait(Duration::from_secs(1)).await.as_deref(), Some("Pro"));
    }
}
