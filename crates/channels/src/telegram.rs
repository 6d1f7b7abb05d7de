//! Telegram channel: outbound messages via the Bot API.
//!
//! Only `sendMessage` is used. Texts over Telegram's length limit are split
//! into several messages, preferring newline boundaries.

use async_trait::async_trait;
use serde::Deserialize;
use shrimp_config::AppConfig;
use shrimp_core::Notifier;
use shrimp_core::error::ChannelError;
use std::time::Duration;
use tracing::{debug, warn};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Chunk size a little under Telegram's 4096-character hard limit.
pub const TELEGRAM_CHUNK_SIZE: usize = 4090;

/// Split `text` into pieces of at most `max_len` characters.
///
/// A piece ends at the last newline if that newline sits in the second
/// half of the window; otherwise it is cut at exactly `max_len`.
/// Whitespace at the cut is trimmed and whitespace-only pieces are dropped.
/// A `max_len` of zero yields no pieces.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || text.trim().is_empty() {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut rest: Vec<char> = text.chars().collect();

    while !rest.is_empty() {
        if rest.len() <= max_len {
            chunks.push(rest.iter().collect::<String>());
            break;
        }
        let window = &rest[..=max_len];
        let split = match window.iter().rposition(|c| *c == '\n') {
            Some(nl) if nl > max_len / 2 => nl + 1,
            _ => max_len,
        };
        let head: String = rest[..split].iter().collect();
        chunks.push(head.trim_end().to_string());
        let tail: String = rest[split..].iter().collect();
        rest = tail.trim_start().chars().collect();
    }
    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>) -> Result<Self, ChannelError> {
        let bot_token = bot_token.into();
        if bot_token.trim().is_empty() {
            return Err(ChannelError::NotConfigured("telegram bot token is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self {
            bot_token,
            api_base: TELEGRAM_API_BASE.into(),
            client,
        })
    }

    /// Build from `[telegram]` config; `None` when no token is set.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, ChannelError> {
        match config.telegram.bot_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Self::new(token).map(Some),
            _ => Ok(None),
        }
    }

    /// Point at a different API host (a local Bot API server, or a test double).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    fn delivery_error(reason: impl Into<String>) -> ChannelError {
        ChannelError::DeliveryFailed {
            channel: "telegram".into(),
            reason: reason.into(),
        }
    }

    async fn send_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        let response = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::delivery_error(e.without_url().to_string()))?;

        let status = response.status();
        let reply: ApiReply = response
            .json()
            .await
            .map_err(|e| Self::delivery_error(format!("HTTP {status}: {}", e.without_url())))?;
        if !reply.ok {
            let reason = reply.description.unwrap_or_else(|| format!("HTTP {status}"));
            warn!(chat_id = %chat_id, %reason, "Telegram rejected message");
            return Err(Self::delivery_error(reason));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_message(&self, session_id: &str, text: &str) -> Result<(), ChannelError> {
        let chunks = chunk_text(text, TELEGRAM_CHUNK_SIZE);
        debug!(chat_id = %session_id, chunks = chunks.len(), "Sending Telegram message");
        for chunk in &chunks {
            self.send_chunk(session_id, chunk).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello", 10), vec!["hello"]);
        assert!(chunk_text("", 10).is_empty());
    }

    #[test]
    fn prefers_late_newlines() {
        let text = "aaaaaaa\nbbbbbbbbbb";
        // Newline at index 7 of a 10-char window: past the halfway mark.
        assert_eq!(chunk_text(text, 10), vec!["aaaaaaa", "bbbbbbbbbb"]);
    }

    #[test]
    fn hard_cut_when_newline_is_early() {
        let text = "a\nbbbbbbbbbbbbbb";
        let chunks = chunk_text(text, 10);
        assert_eq!(chunks[0], "a\nbbbbbbbb");
        assert_eq!(chunks[1], "bbbbbb");
    }

    #[test]
    fn chunks_respect_limit_in_characters() {
        let text = "é".repeat(25);
        let chunks = chunk_text(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn zero_limit_yields_nothing() {
        assert!(chunk_text("hello", 0).is_empty());
    }

    #[test]
    fn whitespace_windows_produce_no_empty_chunks() {
        let leading = format!("{}b", " ".repeat(20));
        assert_eq!(chunk_text(&leading, 10), vec!["b"]);

        let gap = format!("a{}b", " ".repeat(20));
        assert_eq!(chunk_text(&gap, 10), vec!["a", "b"]);

        assert!(chunk_text(" \n \n ", 2).is_empty());
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(
            TelegramNotifier::new("  "),
            Err(ChannelError::NotConfigured(_))
        ));
    }

    #[test]
    fn config_without_token_yields_none() {
        let config = AppConfig::default();
        assert!(TelegramNotifier::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn debug_hides_token() {
        let notifier = TelegramNotifier::new("123:secret")
            .unwrap()
            .with_api_base("http://localhost:8081/");
        let debug = format!("{notifier:?}");
        assert!(!debug.contains("secret"));
        assert_eq!(notifier.endpoint("sendMessage"), "http://localhost:8081/bot123:secret/sendMessage");
    }

    #[tokio::test]
    async fn unreachable_api_is_a_delivery_failure() {
        let notifier = TelegramNotifier::new("123:abc")
            .unwrap()
            .with_api_base("http://127.0.0.1:1");
        let err = notifier.send_message("42", "hi").await.unwrap_err();
        assert!(matches!(err, ChannelError::DeliveryFailed { .. }));
    }
}
