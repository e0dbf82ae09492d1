//! `gauntlet run` — drive the agent through the challenge set.

use std::path::Path;
use std::sync::Arc;

use gauntlet_agent::{DecisionEngine, ProgressionController, RunReport};
use gauntlet_browser::ChromiumEnvironment;
use gauntlet_config::AppConfig;
use gauntlet_core::provider::Provider;
use gauntlet_telemetry::{LlmStats, MeteredProvider, ModelPricing, PricingTable, UsageLedger};
use tracing::{error, info, warn};

use crate::RunArgs;

/// Exit status after Ctrl-C.
const INTERRUPTED_EXIT: i32 = 130;

enum Ending {
    Finished,
    HardTimeout,
    Interrupted,
}

/// Fold command-line flags over the loaded configuration.
pub fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(provider) = &args.provider {
        config.default_provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.default_model = model.clone();
    }
    if args.visible {
        config.browser.headless = false;
    }
    if let Some(secs) = args.timeout {
        config.run.timeout_secs = secs;
    }
    if let Some(output) = &args.output {
        config.run.output_file = output.clone();
    }
    if args.no_vision {
        config.run.use_vision_fallback = false;
    }
    if let Some(url) = &args.url {
        config.run.target_url = url.clone();
    }
}

fn build_ledger(config: &AppConfig) -> Arc<UsageLedger> {
    let overrides = config
        .telemetry
        .custom_pricing
        .iter()
        .map(|(model, p)| (model.clone(), ModelPricing::new(p.input_per_m, p.output_per_m)));
    Arc::new(UsageLedger::with_pricing(PricingTable::with_overrides(overrides)))
}

pub async fn run(args: RunArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    if config.api_key_for(&config.default_provider).is_none() {
        eprintln!("❌ No API key for provider '{}'.", config.default_provider);
        eprintln!("   Set GAUNTLET_API_KEY (or ANTHROPIC_API_KEY / OPENAI_API_KEY) or run `gauntlet onboard`.");
        return Ok(1);
    }

    let router = gauntlet_providers::build_from_config(&config);
    let provider = router
        .default()
        .ok_or_else(|| format!("Provider '{}' is not available", config.default_provider))?;

    let ledger = build_ledger(&config);
    let provider: Arc<dyn Provider> = if config.telemetry.enabled {
        Arc::new(MeteredProvider::new(provider, ledger.clone()))
    } else {
        provider
    };

    let engine = DecisionEngine::new(provider, config.default_model.clone())
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens);

    info!(
        provider = %config.default_provider,
        model = %config.default_model,
        url = %config.run.target_url,
        timeout_secs = config.run.timeout_secs,
        "Starting run"
    );

    let env = ChromiumEnvironment::launch(&config.browser).await?;
    let hard_timeout = config.run.hard_timeout();

    let mut controller = ProgressionController::new(&env, engine, config.run.clone())
        .with_navigation_timeout(config.browser.navigation_timeout());

    let ending = tokio::select! {
        result = tokio::time::timeout(hard_timeout, controller.run()) => match result {
            Ok(Ok(())) => Ending::Finished,
            Ok(Err(e)) => {
                error!(error = %e, "Run aborted");
                Ending::Finished
            }
            Err(_) => Ending::HardTimeout,
        },
        _ = tokio::signal::ctrl_c() => Ending::Interrupted,
    };

    let mut session = controller.into_session();
    match ending {
        Ending::Finished => {}
        Ending::HardTimeout => {
            warn!(limit_secs = hard_timeout.as_secs(), "Hard timeout reached");
            session.finalize(Some("hard timeout".into()));
        }
        Ending::Interrupted => {
            warn!("Interrupted");
            session.finalize(Some("interrupted".into()));
        }
    }
    env.close().await;

    let stats = if config.telemetry.enabled {
        ledger.summary()
    } else {
        LlmStats::default()
    };
    let report = RunReport::new(&session, stats);

    let output = Path::new(&config.run.output_file);
    match report.save(output) {
        Ok(()) => info!(path = %output.display(), "Saved run report"),
        Err(e) => error!(path = %output.display(), error = %e, "Could not save run report"),
    }

    if !args.quiet {
        println!("{}", report.render_summary());
    }

    Ok(match ending {
        Ending::Interrupted => INTERRUPTED_EXIT,
        _ => report.exit_code(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_config::PricingOverrideConfig;

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        let args = RunArgs {
            provider: Some("openai".into()),
            model: Some("gpt-4o".into()),
            visible: true,
            timeout: Some(60),
            output: Some("out.json".into()),
            no_vision: true,
            url: Some("http://localhost:8080".into()),
            ..Default::default()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.default_model, "gpt-4o");
        assert!(!config.browser.headless);
        assert_eq!(config.run.timeout_secs, 60);
        assert_eq!(config.run.output_file, "out.json");
        assert!(!config.run.use_vision_fallback);
        assert_eq!(config.run.target_url, "http://localhost:8080");
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &RunArgs::default());

        assert_eq!(config.default_provider, "anthropic");
        assert!(config.browser.headless);
        assert_eq!(config.run.timeout_secs, 300);
        assert!(config.run.use_vision_fallback);
    }

    #[test]
    fn ledger_uses_custom_pricing() {
        let mut config = AppConfig::default();
        config.telemetry.custom_pricing.insert(
            "house-model".into(),
            PricingOverrideConfig {
                input_per_m: 1.0,
                output_per_m: 2.0,
            },
        );
        let ledger = build_ledger(&config);
        let price = ledger.pricing().get("house-model").unwrap();
        assert_eq!(price.output_per_m, 2.0);
        assert!(ledger.pricing().get("openai/gpt-4o").is_some());
    }
}
