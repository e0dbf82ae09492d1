//! `gauntlet pricing` — list the model prices used for cost estimates.

use gauntlet_config::AppConfig;
use gauntlet_telemetry::{ModelPricing, PricingTable};

/// Built-in prices merged with the config's `[telemetry.custom_pricing]`.
fn effective_table(config: Option<&AppConfig>) -> PricingTable {
    let overrides = config
        .map(|c| {
            c.telemetry
                .custom_pricing
                .iter()
                .map(|(model, p)| (model.clone(), ModelPricing::new(p.input_per_m, p.output_per_m)))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    PricingTable::with_overrides(overrides)
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().ok();
    let table = effective_table(config.as_ref());
    let models = table.models();

    println!("💰 Model Pricing (per 1M tokens)");
    println!("─────────────────────────────────────────────────────");
    println!("{:<40} {:>10} {:>10}", "Model", "Input", "Output");
    println!("{:<40} {:>10} {:>10}", "─────", "─────", "──────");

    for name in &models {
        if let Some(p) = table.get(name) {
            println!("{:<40} ${:>8.3} ${:>8.3}", name, p.input_per_m, p.output_per_m);
        }
    }

    println!();
    println!("  {} models with pricing data", models.len());

    Ok(())
}
