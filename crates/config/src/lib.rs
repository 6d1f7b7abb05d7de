//! Configuration loading and validation for openshrimp.
//!
//! Loads `~/.openshrimp/config.toml` and layers environment variable
//! overrides on top. Every field has a default, so an empty or missing
//! file yields a working configuration.

use serde::{Deserialize, Serialize};
use shrimp_core::Effort;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Pins every effort tier to one primary model when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Per-request LLM timeout
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub human_input: HumanInputConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_llm_timeout() -> u64 {
    120
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("agent", &self.agent)
            .field("human_input", &self.human_input)
            .field("telegram", &self.telegram)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub effort: EffortTable,

    #[serde(default)]
    pub governor: GovernorConfig,

    /// Observation bodies longer than this are truncated
    #[serde(default = "default_tool_result_max_chars")]
    pub tool_result_max_chars: usize,

    /// Cap on auto-archived research content
    #[serde(default = "default_archive_max_chars")]
    pub archive_max_chars: usize,

    /// Per-observation preview length in the tool-limit summary
    #[serde(default = "default_fallback_preview_chars")]
    pub fallback_preview_chars: usize,
}

fn default_tool_result_max_chars() -> usize {
    15_000
}
fn default_archive_max_chars() -> usize {
    12_000
}
fn default_fallback_preview_chars() -> usize {
    3_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            effort: EffortTable::default(),
            governor: GovernorConfig::default(),
            tool_result_max_chars: default_tool_result_max_chars(),
            archive_max_chars: default_archive_max_chars(),
            fallback_preview_chars: default_fallback_preview_chars(),
        }
    }
}

/// Model choice and round budget for one effort tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortConfig {
    pub max_rounds: u32,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
    /// Reasoning effort sent to the provider; "none" disables it
    #[serde(default = "default_reasoning")]
    pub reasoning: String,
}

fn default_reasoning() -> String {
    "none".into()
}

impl EffortConfig {
    fn new(max_rounds: u32, model: &str) -> Self {
        Self {
            max_rounds,
            model: model.into(),
            fallback_model: Some(FALLBACK_MODEL.into()),
            reasoning: default_reasoning(),
        }
    }

    /// The reasoning parameter to send, if any.
    pub fn reasoning_effort(&self) -> Option<&str> {
        let r = self.reasoning.trim();
        if r.is_empty() || r.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(r)
        }
    }
}

const FALLBACK_MODEL: &str = "deepseek/deepseek-v3.2";

/// Upper bound on any tier's `max_rounds`.
pub const MAX_ROUNDS_LIMIT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortTable {
    #[serde(default = "default_quick")]
    pub quick: EffortConfig,
    #[serde(default = "default_normal")]
    pub normal: EffortConfig,
    #[serde(default = "default_deep")]
    pub deep: EffortConfig,
}

fn default_quick() -> EffortConfig {
    EffortConfig::new(5, "openai/gpt-oss-120b")
}
fn default_normal() -> EffortConfig {
    EffortConfig::new(10, "deepseek/deepseek-v3.2")
}
fn default_deep() -> EffortConfig {
    EffortConfig::new(25, "z-ai/glm-5")
}

impl Default for EffortTable {
    fn default() -> Self {
        Self {
            quick: default_quick(),
            normal: default_normal(),
            deep: default_deep(),
        }
    }
}

impl EffortTable {
    pub fn get(&self, effort: Effort) -> &EffortConfig {
        match effort {
            Effort::Quick => &self.quick,
            Effort::Normal => &self.normal,
            Effort::Deep => &self.deep,
        }
    }

    pub fn get_mut(&mut self, effort: Effort) -> &mut EffortConfig {
        match effort {
            Effort::Quick => &mut self.quick,
            Effort::Normal => &mut self.normal,
            Effort::Deep => &mut self.deep,
        }
    }
}

/// Loop-governor thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    #[serde(default = "default_identical_warn")]
    pub identical_warn: u32,
    #[serde(default = "default_identical_block")]
    pub identical_block: u32,
    #[serde(default = "default_name_warn")]
    pub name_warn: u32,
    #[serde(default = "default_name_block")]
    pub name_block: u32,
    /// Per-tool replacements for `name_warn`
    #[serde(default = "default_name_warn_overrides")]
    pub name_warn_overrides: HashMap<String, u32>,
    /// Per-tool replacements for `name_block`
    #[serde(default = "default_name_block_overrides")]
    pub name_block_overrides: HashMap<String, u32>,
}

fn default_identical_warn() -> u32 {
    3
}
fn default_identical_block() -> u32 {
    5
}
fn default_name_warn() -> u32 {
    4
}
fn default_name_block() -> u32 {
    7
}
// The browser is multi-action: navigate, click and read are separate calls.
fn default_name_warn_overrides() -> HashMap<String, u32> {
    HashMap::from([("browser".to_string(), 10)])
}
fn default_name_block_overrides() -> HashMap<String, u32> {
    HashMap::from([("browser".to_string(), 20)])
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            identical_warn: default_identical_warn(),
            identical_block: default_identical_block(),
            name_warn: default_name_warn(),
            name_block: default_name_block(),
            name_warn_overrides: default_name_warn_overrides(),
            name_block_overrides: default_name_block_overrides(),
        }
    }
}

impl GovernorConfig {
    pub fn name_warn_for(&self, tool_name: &str) -> u32 {
        self.name_warn_overrides
            .get(tool_name)
            .copied()
            .unwrap_or(self.name_warn)
    }

    pub fn name_block_for(&self, tool_name: &str) -> u32 {
        self.name_block_overrides
            .get(tool_name)
            .copied()
            .unwrap_or(self.name_block)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanInputConfig {
    #[serde(default = "default_human_timeout")]
    pub default_timeout_secs: u64,

    /// Questions older than this get a reminder
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_max_asks")]
    pub max_asks_per_task: u32,
}

fn default_human_timeout() -> u64 {
    600
}
fn default_stale_after() -> u64 {
    300
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_max_asks() -> u32 {
    2
}

impl Default for HumanInputConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_human_timeout(),
            stale_after_secs: default_stale_after(),
            sweep_interval_secs: default_sweep_interval(),
            max_asks_per_task: default_max_asks(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redact(&self.bot_token))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.openshrimp/config.toml)
    /// and apply environment overrides.
    ///
    /// API key lookup order when the file has none:
    /// - `OPENSHRIMP_API_KEY`
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Layer overrides from `lookup` (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.api_key.is_none() {
            self.api_key = non_empty("OPENSHRIMP_API_KEY")
                .or_else(|| non_empty("OPENROUTER_API_KEY"))
                .or_else(|| non_empty("OPENAI_API_KEY"));
        }
        if let Some(model) = non_empty("OPENSHRIMP_MODEL") {
            self.default_model = Some(model);
        }
        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }

        if let Some(v) = non_empty("LLM_TIMEOUT") {
            self.llm_timeout_secs = parse_env("LLM_TIMEOUT", &v)?;
        }
        if let Some(v) = non_empty("TOOL_RESULT_MAX_CHARS") {
            self.agent.tool_result_max_chars = parse_env("TOOL_RESULT_MAX_CHARS", &v)?;
        }
        if let Some(v) = non_empty("MAX_ASKS_PER_TASK") {
            self.human_input.max_asks_per_task = parse_env("MAX_ASKS_PER_TASK", &v)?;
        }

        let governor = &mut self.agent.governor;
        for (key, slot) in [
            ("TOOL_LOOP_WARN_THRESHOLD", &mut governor.identical_warn),
            ("TOOL_LOOP_BLOCK_THRESHOLD", &mut governor.identical_block),
            ("TOOL_NAME_WARN_THRESHOLD", &mut governor.name_warn),
            ("TOOL_NAME_BLOCK_THRESHOLD", &mut governor.name_block),
        ] {
            if let Some(v) = non_empty(key) {
                *slot = parse_env(key, &v)?;
            }
        }

        for effort in Effort::ALL {
            let tier = effort.as_str().to_ascii_uppercase();
            let cfg = self.agent.effort.get_mut(effort);
            let key = format!("AGENT_{tier}_MAX_TOOL_ROUNDS");
            if let Some(v) = non_empty(&key) {
                cfg.max_rounds = parse_env(&key, &v)?;
            }
            if let Some(model) = non_empty(&format!("OPENROUTER_MODEL_{tier}")) {
                cfg.model = model;
            }
            if let Some(model) = non_empty(&format!("OPENROUTER_MODEL_{tier}_FALLBACK")) {
                cfg.fallback_model = Some(model);
            }
            if let Some(reasoning) = non_empty(&format!("OPENROUTER_REASONING_{tier}")) {
                cfg.reasoning = reasoning;
            }
        }

        Ok(())
    }

    /// Effective settings for a tier, with `default_model` applied.
    pub fn effort(&self, effort: Effort) -> EffortConfig {
        let mut cfg = self.agent.effort.get(effort).clone();
        if let Some(model) = &self.default_model {
            cfg.model = model.clone();
        }
        cfg
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".openshrimp")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.agent.governor;
        if g.identical_warn > g.identical_block {
            return Err(ConfigError::ValidationError(format!(
                "identical_warn ({}) must not exceed identical_block ({})",
                g.identical_warn, g.identical_block
            )));
        }
        if g.name_warn > g.name_block {
            return Err(ConfigError::ValidationError(format!(
                "name_warn ({}) must not exceed name_block ({})",
                g.name_warn, g.name_block
            )));
        }
        for (tool, warn) in &g.name_warn_overrides {
            let block = g.name_block_for(tool);
            if *warn > block {
                return Err(ConfigError::ValidationError(format!(
                    "name_warn_overrides.{tool} ({warn}) must not exceed its block threshold ({block})"
                )));
            }
        }

        for effort in Effort::ALL {
            let cfg = self.agent.effort.get(effort);
            if cfg.max_rounds == 0 || cfg.max_rounds > MAX_ROUNDS_LIMIT {
                return Err(ConfigError::ValidationError(format!(
                    "agent.effort.{effort}.max_rounds must be between 1 and {MAX_ROUNDS_LIMIT}"
                )));
            }
            if cfg.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "agent.effort.{effort}.model must not be empty"
                )));
            }
        }

        if self.llm_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm_timeout_secs must be > 0".into(),
            ));
        }
        if self.agent.tool_result_max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "tool_result_max_chars must be > 0".into(),
            ));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Default config as TOML (for `shrimp config`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_model: None,
            llm_timeout_secs: default_llm_timeout(),
            agent: AgentConfig::default(),
            human_input: HumanInputConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm_timeout_secs, 120);
        assert_eq!(config.agent.effort.quick.max_rounds, 5);
        assert_eq!(config.agent.effort.normal.max_rounds, 10);
        assert_eq!(config.agent.effort.deep.max_rounds, 25);
        assert_eq!(config.agent.tool_result_max_chars, 15_000);
        assert_eq!(config.human_input.max_asks_per_task, 2);
    }

    #[test]
    fn browser_has_higher_name_thresholds() {
        let g = GovernorConfig::default();
        assert_eq!(g.name_warn_for("browser"), 10);
        assert_eq!(g.name_block_for("browser"), 20);
        assert_eq!(g.name_warn_for("web_fetch"), 4);
        assert_eq!(g.name_block_for("web_fetch"), 7);
    }

    #[test]
    fn reasoning_none_disables() {
        let mut cfg = default_deep();
        assert_eq!(cfg.reasoning_effort(), None);
        cfg.reasoning = "high".into();
        assert_eq!(cfg.reasoning_effort(), Some("high"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agent.effort, EffortTable::default());
        assert_eq!(parsed.agent.governor, GovernorConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[agent.governor]
identical_block = 9

[agent.effort.quick]
max_rounds = 3
model = "some/model"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.agent.governor.identical_block, 9);
        assert_eq!(config.agent.governor.identical_warn, 3);
        assert_eq!(config.agent.effort.quick.model, "some/model");
        assert_eq!(config.agent.effort.quick.reasoning, "none");
        assert_eq!(config.agent.effort.deep.max_rounds, 25);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "agent = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn warn_above_block_rejected() {
        let mut config = AppConfig::default();
        config.agent.governor.name_warn = 8;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.agent.governor.identical_warn = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_rounds_rejected() {
        let mut config = AppConfig::default();
        config.agent.effort.deep.max_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("OPENROUTER_API_KEY", "sk-or"),
                ("LLM_TIMEOUT", "30"),
                ("TOOL_LOOP_BLOCK_THRESHOLD", "8"),
                ("AGENT_QUICK_MAX_TOOL_ROUNDS", "2"),
                ("OPENROUTER_MODEL_DEEP", "x/deep"),
                ("OPENROUTER_MODEL_DEEP_FALLBACK", "x/backup"),
                ("OPENROUTER_REASONING_NORMAL", "low"),
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ]))
            .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.llm_timeout_secs, 30);
        assert_eq!(config.agent.governor.identical_block, 8);
        assert_eq!(config.agent.effort.quick.max_rounds, 2);
        assert_eq!(config.agent.effort.deep.model, "x/deep");
        assert_eq!(config.agent.effort.deep.fallback_model.as_deref(), Some("x/backup"));
        assert_eq!(config.agent.effort.normal.reasoning_effort(), Some("low"));
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
    }

    #[test]
    fn api_key_precedence() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("OPENAI_API_KEY", "sk-openai"),
                ("OPENSHRIMP_API_KEY", "sk-shrimp"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-shrimp"));
    }

    #[test]
    fn bad_env_number_is_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(env(&[("LLM_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("LLM_TIMEOUT"));
    }

    #[test]
    fn out_of_range_env_numbers_are_errors() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(env(&[("AGENT_DEEP_MAX_TOOL_ROUNDS", "4294967298")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == "AGENT_DEEP_MAX_TOOL_ROUNDS"));
        assert_eq!(config.agent.effort.deep.max_rounds, 25);

        let err = config
            .apply_overrides(env(&[("TOOL_LOOP_BLOCK_THRESHOLD", "-1")]))
            .unwrap_err();
        assert!(err.to_string().contains("TOOL_LOOP_BLOCK_THRESHOLD"));
    }

    #[test]
    fn huge_round_budget_rejected() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[("AGENT_NORMAL_MAX_TOOL_ROUNDS", "4294967295")]))
            .unwrap();
        assert!(config.validate().is_err());

        config.agent.effort.normal.max_rounds = MAX_ROUNDS_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_model_pins_every_tier() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[("OPENSHRIMP_MODEL", "pinned/model")]))
            .unwrap();
        for effort in Effort::ALL {
            assert_eq!(config.effort(effort).model, "pinned/model");
        }
        assert_eq!(config.agent.effort.quick.model, "openai/gpt-oss-120b");
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            telegram: TelegramConfig {
                bot_token: Some("123:token".into()),
            },
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("123:token"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
