//! Model prices for costing oracle calls.
//!
//! Prices are USD per million tokens, keyed `provider/model`. Replies often
//! name the model without a provider or with a date suffix, so lookups fall
//! back from the exact key to the bare model name and then to the longest
//! known name the reply starts with.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Built-in prices: (key, input per 1M, output per 1M).
const DEFAULT_PRICES: &[(&str, f64, f64)] = &[
    ("anthropic/claude-3-5-haiku-20241022", 0.8, 4.0),
    ("anthropic/claude-3-5-sonnet-20241022", 3.0, 15.0),
    ("anthropic/claude-3-haiku-20240307", 0.25, 1.25),
    ("anthropic/claude-sonnet-4-20250514", 3.0, 15.0),
    ("anthropic/claude-opus-4-20250514", 15.0, 75.0),
    ("openai/gpt-4o", 2.5, 10.0),
    ("openai/gpt-4o-mini", 0.15, 0.6),
    ("openai/gpt-4-turbo", 10.0, 30.0),
    ("openai/gpt-4.1", 2.0, 8.0),
    ("openai/gpt-4.1-mini", 0.4, 1.6),
    ("google/gemini-2.0-flash", 0.1, 0.4),
    ("google/gemini-1.5-pro", 1.25, 5.0),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_m: f64,
    pub output_per_m: f64,
}

impl ModelPricing {
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (f64::from(input_tokens) * self.input_per_m + f64::from(output_tokens) * self.output_per_m)
            / 1_000_000.0
    }
}

/// Last path segment, lowercased: `openrouter/openai/gpt-4o` → `gpt-4o`.
fn bare_name(model: &str) -> String {
    model.rsplit('/').next().unwrap_or(model).to_lowercase()
}

/// Shared, runtime-extendable price table.
pub struct PricingTable {
    prices: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    pub fn with_defaults() -> Self {
        let prices = DEFAULT_PRICES
            .iter()
            .map(|(key, input, output)| ((*key).to_string(), ModelPricing::new(*input, *output)))
            .collect();
        Self {
            prices: RwLock::new(prices),
        }
    }

    /// Built-in prices with `overrides` applied on top.
    pub fn with_overrides<I, K>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, ModelPricing)>,
        K: Into<String>,
    {
        let table = Self::with_defaults();
        for (model, pricing) in overrides {
            table.set(model, pricing);
        }
        table
    }

    pub fn empty() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Exact-key lookup.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        let prices = self.prices.read().unwrap_or_else(|e| e.into_inner());
        prices.get(model).cloned()
    }

    pub fn set(&self, model: impl Into<String>, pricing: ModelPricing) {
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        prices.insert(model.into(), pricing);
    }

    /// Price for whatever name a reply carried: exact key, then the same bare
    /// name under any provider, then the longest bare name it starts with.
    pub fn resolve(&self, model: &str) -> Option<ModelPricing> {
        let prices = self.prices.read().unwrap_or_else(|e| e.into_inner());
        if let Some(p) = prices.get(model) {
            return Some(p.clone());
        }

        let wanted = bare_name(model);
        prices
            .iter()
            .map(|(key, pricing)| (bare_name(key), pricing))
            .filter(|(bare, _)| wanted.starts_with(bare.as_str()))
            .max_by_key(|(bare, _)| bare.len())
            .map(|(_, pricing)| pricing.clone())
    }

    /// Cost of one call; unknown models cost nothing.
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.resolve(model)
            .map(|p| p.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }

    /// Known keys, sorted.
    pub fn models(&self) -> Vec<String> {
        let prices = self.prices.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = prices.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.prices.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
