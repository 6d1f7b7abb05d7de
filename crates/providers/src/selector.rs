//! Effort-tier model selection with one-shot failover.
//!
//! Each tier names a primary and an optional fallback model. A call that
//! fails with a transient error (see [`is_transient`]) is retried once on
//! the fallback when it differs from the primary; anything else is
//! returned to the caller unchanged.

use shrimp_config::{AppConfig, EffortConfig};
use shrimp_core::error::ProviderError;
use shrimp_core::provider::*;
use shrimp_core::{DomainEvent, Effort, EventBus, Message};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP statuses worth retrying on another model.
const TRANSIENT_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Lower-case message fragments that mark a failure as transient.
const TRANSIENT_PATTERNS: [&str; 7] = [
    "timeout",
    "timed out",
    "rate limit",
    "connection reset",
    "model not available",
    "no endpoints",
    "overloaded",
];

/// Whether `err` is worth one retry on the fallback model.
pub fn is_transient(err: &ProviderError) -> bool {
    match err {
        ProviderError::Timeout(_) | ProviderError::Network(_) | ProviderError::RateLimited { .. } => {
            return true;
        }
        ProviderError::ApiError { status_code, .. }
            if TRANSIENT_STATUS_CODES.contains(status_code) =>
        {
            return true;
        }
        ProviderError::AuthenticationFailed(_) | ProviderError::NotConfigured(_) => return false,
        _ => {}
    }

    let text = err.to_string().to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| text.contains(p))
        || TRANSIENT_STATUS_CODES
            .iter()
            .any(|code| text.contains(&code.to_string()))
}

/// The resolved model configuration for one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelChoice {
    pub model: String,
    pub fallback: Option<String>,
    pub reasoning_effort: Option<String>,
    pub timeout: Duration,
}

impl ModelChoice {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            fallback: None,
            reasoning_effort: None,
            timeout,
        }
    }

    pub fn with_fallback(mut self, model: impl Into<String>) -> Self {
        self.fallback = Some(model.into());
        self
    }

    pub fn with_reasoning(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    fn from_config(cfg: &EffortConfig, timeout: Duration) -> Self {
        Self {
            model: cfg.model.clone(),
            fallback: cfg.fallback_model.clone(),
            reasoning_effort: cfg.reasoning_effort().map(String::from),
            timeout,
        }
    }

    /// The fallback model, if configured and distinct from the primary.
    pub fn distinct_fallback(&self) -> Option<&str> {
        self.fallback
            .as_deref()
            .filter(|f| !f.is_empty() && *f != self.model)
    }

    fn request(&self, model: &str, messages: Vec<Message>, tools: Vec<ToolDefinition>) -> ProviderRequest {
        let mut request = ProviderRequest::new(model, messages);
        request.tools = tools;
        request.reasoning_effort = self.reasoning_effort.clone();
        request.timeout_secs = Some(self.timeout.as_secs().max(1));
        request
    }
}

/// A successful completion and which model produced it.
#[derive(Debug, Clone)]
pub struct Completion {
    pub response: ProviderResponse,
    pub model_used: String,
    pub fell_back: bool,
}

/// Maps effort tiers to models and runs completions with failover.
///
/// Read-only after construction; share it across Runs behind an `Arc`.
pub struct ModelSelector {
    provider: Arc<dyn Provider>,
    quick: ModelChoice,
    normal: ModelChoice,
    deep: ModelChoice,
    events: Option<Arc<EventBus>>,
}

impl ModelSelector {
    pub fn new(
        provider: Arc<dyn Provider>,
        quick: ModelChoice,
        normal: ModelChoice,
        deep: ModelChoice,
    ) -> Self {
        Self {
            provider,
            quick,
            normal,
            deep,
            events: None,
        }
    }

    /// Build the tier table from configuration.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let timeout = Duration::from_secs(config.llm_timeout_secs);
        let choice = |effort| ModelChoice::from_config(&config.effort(effort), timeout);
        Self::new(
            provider,
            choice(Effort::Quick),
            choice(Effort::Normal),
            choice(Effort::Deep),
        )
    }

    /// Use one choice for every tier.
    pub fn uniform(provider: Arc<dyn Provider>, choice: ModelChoice) -> Self {
        Self::new(provider, choice.clone(), choice.clone(), choice)
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn choice(&self, effort: Effort) -> &ModelChoice {
        match effort {
            Effort::Quick => &self.quick,
            Effort::Normal => &self.normal,
            Effort::Deep => &self.deep,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one completion for `effort`, failing over at most once.
    pub async fn complete(
        &self,
        effort: Effort,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<Completion, ProviderError> {
        let choice = self.choice(effort);
        let fallback = choice.distinct_fallback();

        // Keep a copy only when a retry is possible.
        let retry_input = fallback.map(|_| (messages.clone(), tools.clone()));

        let primary_err = match self
            .attempt(choice, choice.model.as_str(), messages, tools)
            .await
        {
            Ok(response) => {
                return Ok(Completion {
                    response,
                    model_used: choice.model.clone(),
                    fell_back: false,
                });
            }
            Err(e) => e,
        };

        let (Some(fallback), Some((messages, tools))) = (fallback, retry_input) else {
            return Err(primary_err);
        };
        if !is_transient(&primary_err) {
            debug!(model = %choice.model, error = %primary_err, "Non-transient provider error, not retrying");
            return Err(primary_err);
        }

        warn!(
            primary = %choice.model,
            fallback = %fallback,
            error = %primary_err,
            effort = %effort,
            "Primary model failed, retrying with fallback"
        );
        if let Some(events) = &self.events {
            events.publish(DomainEvent::FallbackModelUsed {
                primary: choice.model.clone(),
                fallback: fallback.to_string(),
                error: primary_err.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }

        let response = self.attempt(choice, fallback, messages, tools).await?;
        Ok(Completion {
            response,
            model_used: fallback.to_string(),
            fell_back: true,
        })
    }

    async fn attempt(
        &self,
        choice: &ModelChoice,
        model: &str,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = choice.request(model, messages, tools);
        debug!(provider = %self.provider.name(), model = %model, "Invoking model");

        match tokio::time::timeout(choice.timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "Model '{}' timed out after {}s",
                model,
                choice.timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers per model name; records every model it was asked for.
    struct ScriptedProvider {
        outcomes: HashMap<String, Result<String, ProviderError>>,
        calls: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(outcomes: &[(&str, Result<&str, ProviderError>)]) -> Self {
            Self {
                outcomes: outcomes
                    .iter()
                    .map(|(m, r)| (m.to_string(), r.clone().map(String::from)))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn models_called(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|r| r.model.clone()).collect()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let model = request.model.clone();
            self.calls.lock().unwrap().push(request);
            match self.outcomes.get(&model) {
                Some(Ok(text)) => Ok(ProviderResponse {
                    message: Message::assistant(text.clone()),
                    usage: None,
                    model,
                }),
                Some(Err(e)) => Err(e.clone()),
                None => Err(ProviderError::ModelNotFound(model)),
            }
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ProviderError::Network("unreachable".into()))
        }
    }

    fn choice() -> ModelChoice {
        ModelChoice::new("primary", Duration::from_secs(120)).with_fallback("backup")
    }

    fn selector(provider: Arc<ScriptedProvider>) -> ModelSelector {
        ModelSelector::uniform(provider, choice())
    }

    #[test]
    fn transient_classification() {
        assert!(is_transient(&ProviderError::Timeout("x".into())));
        assert!(is_transient(&ProviderError::Network("conn refused".into())));
        assert!(is_transient(&ProviderError::RateLimited { retry_after_secs: 1 }));
        for code in TRANSIENT_STATUS_CODES {
            assert!(is_transient(&ProviderError::ApiError {
                status_code: code,
                message: String::new(),
            }));
        }
        assert!(is_transient(&ProviderError::ApiError {
            status_code: 400,
            message: "Model is currently overloaded".into(),
        }));
        assert!(is_transient(&ProviderError::ModelNotFound(
            "No endpoints found for z-ai/glm-5".into()
        )));
    }

    #[test]
    fn fatal_classification() {
        assert!(!is_transient(&ProviderError::AuthenticationFailed("bad key".into())));
        assert!(!is_transient(&ProviderError::NotConfigured("no key".into())));
        assert!(!is_transient(&ProviderError::ModelNotFound("foo/bar".into())));
        assert!(!is_transient(&ProviderError::ApiError {
            status_code: 400,
            message: "invalid tool schema".into(),
        }));
    }

    #[test]
    fn fallback_equal_to_primary_is_ignored() {
        let c = ModelChoice::new("same", Duration::from_secs(1)).with_fallback("same");
        assert_eq!(c.distinct_fallback(), None);
    }

    #[test]
    fn from_config_uses_tier_table() {
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let selector = ModelSelector::from_config(provider, &AppConfig::default());
        assert_eq!(selector.choice(Effort::Quick).model, "openai/gpt-oss-120b");
        assert_eq!(selector.choice(Effort::Deep).model, "z-ai/glm-5");
        assert_eq!(
            selector.choice(Effort::Deep).fallback.as_deref(),
            Some("deepseek/deepseek-v3.2")
        );
        assert_eq!(selector.choice(Effort::Normal).reasoning_effort, None);
        assert_eq!(selector.choice(Effort::Normal).timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn primary_success_does_not_touch_fallback() {
        let provider = Arc::new(ScriptedProvider::new(&[("primary", Ok("hi"))]));
        let out = selector(provider.clone())
            .complete(Effort::Normal, vec![Message::user("q")], vec![])
            .await
            .unwrap();
        assert!(!out.fell_back);
        assert_eq!(out.model_used, "primary");
        assert_eq!(provider.models_called(), vec!["primary"]);
    }

    #[tokio::test]
    async fn transient_error_fails_over_once() {
        let provider = Arc::new(ScriptedProvider::new(&[
            (
                "primary",
                Err(ProviderError::ApiError {
                    status_code: 503,
                    message: "Service Unavailable".into(),
                }),
            ),
            ("backup", Ok("from backup")),
        ]));
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();

        let out = selector(provider.clone())
            .with_events(bus)
            .complete(Effort::Normal, vec![Message::user("q")], vec![])
            .await
            .unwrap();

        assert!(out.fell_back);
        assert_eq!(out.response.message.content, "from backup");
        assert_eq!(provider.models_called(), vec!["primary", "backup"]);
        assert!(matches!(
            rx.try_recv().unwrap().as_ref(),
            DomainEvent::FallbackModelUsed { .. }
        ));
    }

    #[tokio::test]
    async fn fatal_error_skips_fallback() {
        let provider = Arc::new(ScriptedProvider::new(&[
            ("primary", Err(ProviderError::AuthenticationFailed("bad key".into()))),
            ("backup", Ok("unused")),
        ]));
        let err = selector(provider.clone())
            .complete(Effort::Normal, vec![], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert_eq!(provider.models_called(), vec!["primary"]);
    }

    #[tokio::test]
    async fn fallback_failure_is_not_retried_again() {
        let provider = Arc::new(ScriptedProvider::new(&[
            ("primary", Err(ProviderError::RateLimited { retry_after_secs: 1 })),
            ("backup", Err(ProviderError::Network("connection reset".into()))),
        ]));
        let err = selector(provider.clone())
            .complete(Effort::Normal, vec![], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert_eq!(provider.models_called(), vec!["primary", "backup"]);
    }

    #[tokio::test]
    async fn request_carries_tier_settings() {
        let provider = Arc::new(ScriptedProvider::new(&[("primary", Ok("ok"))]));
        let tools = vec![ToolDefinition {
            name: "notify_user".into(),
            description: "Notify".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        ModelSelector::uniform(provider.clone(), choice().with_reasoning("high"))
            .complete(Effort::Deep, vec![], tools)
            .await
            .unwrap();

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[0].temperature, 0.0);
        assert_eq!(calls[0].reasoning_effort.as_deref(), Some("high"));
        assert_eq!(calls[0].timeout_secs, Some(120));
        assert_eq!(calls[0].tools.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_model_times_out_as_transient() {
        let selector = ModelSelector::uniform(
            Arc::new(HangingProvider),
            ModelChoice::new("slow", Duration::from_secs(5)),
        );
        let err = selector
            .complete(Effort::Quick, vec![], vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(is_transient(&err));
    }
}
