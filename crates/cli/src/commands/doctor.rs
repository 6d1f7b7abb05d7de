//! `shrimp doctor`: Diagnose setup.

use shrimp_agent::step_ceiling;
use shrimp_config::AppConfig;
use shrimp_core::Effort;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 openshrimp doctor");
    println!("====================\n");

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file at {}", config_path.display());
    } else {
        println!("  ℹ️  No config file, using defaults (`shrimp config > {}`)", config_path.display());
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue found. See above for details.");
            return Ok(());
        }
    };

    let issues = report(&config);
    for line in &issues.lines {
        println!("  {line}");
    }

    println!();
    println!("  Effort tiers:");
    for effort in Effort::ALL {
        let tier = config.effort(effort);
        let fallback = tier.fallback_model.as_deref().unwrap_or("none");
        println!(
            "    {:<6} {} (fallback: {fallback}, reasoning: {}, {} rounds, {} steps)",
            effort.as_str(),
            tier.model,
            tier.reasoning,
            tier.max_rounds,
            step_ceiling(tier.max_rounds)
        );
    }

    println!();
    if issues.count == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {} issue(s) found. See above for details.", issues.count);
    }
    Ok(())
}

struct Report {
    lines: Vec<String>,
    count: usize,
}

fn report(config: &AppConfig) -> Report {
    let mut lines = Vec::new();
    let mut count = 0;

    if config.has_api_key() {
        lines.push("✅ API key configured".to_string());
    } else {
        lines.push("❌ No API key (set OPENROUTER_API_KEY)".to_string());
        count += 1;
    }

    if config.telegram.bot_token.is_some() {
        lines.push("✅ Telegram bot token set".to_string());
    } else {
        lines.push("ℹ️  No Telegram bot token; `--telegram` is unavailable".to_string());
    }

    for effort in Effort::ALL {
        let tier = config.effort(effort);
        if tier.fallback_model.as_deref() == Some(tier.model.as_str()) {
            lines.push(format!("ℹ️  {effort} has no distinct fallback model"));
        }
    }

    Report { lines, count }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_an_issue() {
        let report = report(&AppConfig::default());
        assert_eq!(report.count, 1);
        assert!(report.lines[0].contains("No API key"));
    }

    #[test]
    fn fallback_equal_to_primary_is_noted_not_counted() {
        let mut config = AppConfig::default();
        config.api_key = Some("k".into());
        let model = config.agent.effort.quick.model.clone();
        config.agent.effort.quick.fallback_model = Some(model);

        let report = report(&config);
        assert_eq!(report.count, 0);
        assert!(report.lines.iter().any(|l| l.contains("quick has no distinct fallback")));
    }
}
