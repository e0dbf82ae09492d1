//! `gauntlet config` — configuration management commands.

use gauntlet_config::AppConfig;

const REDACTED: &str = "[REDACTED]";

/// Replace every secret with a placeholder so the config can be printed.
fn redacted(mut config: AppConfig) -> AppConfig {
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.into());
        }
    }
    config
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if config.api_key_for(&config.default_provider).is_none() {
                warnings.push("No API key set (set GAUNTLET_API_KEY or ANTHROPIC_API_KEY env var)");
            }
            if !config.run.use_vision_fallback {
                warnings.push("Vision fallback disabled; stalled challenges rely on text only");
            }
            if config.run.first_challenge_stall_secs >= config.run.timeout_secs {
                warnings.push("first_challenge_stall_secs is not shorter than the run timeout");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:    {}", config.default_provider);
            println!("   Model:       {}", config.default_model);
            println!("   Target:      {}", config.run.target_url);
            println!("   Challenges:  {}", config.run.max_challenges);
            println!("   Timeout:     {}s", config.run.timeout_secs);
            println!("   Headless:    {}", config.browser.headless);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
