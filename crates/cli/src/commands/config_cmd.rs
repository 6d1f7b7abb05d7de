//! `shrimp config`: Configuration management commands.

use shrimp_config::AppConfig;
use shrimp_core::Effort;

const REDACTED: &str = "[REDACTED]";

pub fn print_default() {
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", AppConfig::default_toml());
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Endpoint:  {}", config.base_url);
    for effort in Effort::ALL {
        let tier = config.effort(effort);
        println!(
            "   {:<9}  {} ({} rounds)",
            format!("{effort}:"),
            tier.model,
            tier.max_rounds
        );
    }
    Ok(())
}

/// Copy of `config` that is safe to print.
fn redacted(mut config: AppConfig) -> AppConfig {
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    if config.telegram.bot_token.is_some() {
        config.telegram.bot_token = Some(REDACTED.into());
    }
    config
}

/// Problems that do not stop the config from loading.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set OPENROUTER_API_KEY or OPENAI_API_KEY)".to_string());
    }
    if config.human_input.stale_after_secs >= config.human_input.default_timeout_secs {
        warnings.push(
            "human_input.stale_after_secs is not below default_timeout_secs; reminders will never fire"
                .to_string(),
        );
    }
    warnings
}
