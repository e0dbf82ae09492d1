//! Per-call usage ledger for oracle requests.

use crate::pricing::PricingTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

/// Which decision path produced a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Vision,
}

/// One recorded oracle call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub latency_ms: f64,
    pub modality: Modality,
}

/// Aggregated view written into the run report as `llm_stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmStats {
    pub total_calls: u64,
    pub vision_calls: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// USD, rounded to 4 decimals
    pub total_cost: f64,
    /// Rounded to 2 decimals
    pub total_latency_ms: f64,
    pub by_model: Vec<ModelUsage>,
}

impl LlmStats {
    /// Average spend per completed challenge; `None` when nothing completed.
    pub fn cost_per_challenge(&self, completed: u32) -> Option<f64> {
        (completed > 0).then(|| self.total_cost / f64::from(completed))
    }
}

/// Usage breakdown for a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Thread-safe ledger of every oracle call made during a run.
pub struct UsageLedger {
    pricing: PricingTable,
    calls: RwLock<Vec<CallRecord>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::with_pricing(PricingTable::with_defaults())
    }

    pub fn with_pricing(pricing: PricingTable) -> Self {
        Self {
            pricing,
            calls: RwLock::new(Vec::new()),
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Record a completed call, pricing it from the table.
    pub fn record(
        &self,
        model: &str,
        input_tokens: u32,
        output_tokens: u32,
        latency: Duration,
        modality: Modality,
    ) -> CallRecord {
        let record = CallRecord {
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost_usd: self.pricing.compute_cost(model, input_tokens, output_tokens),
            latency_ms: latency.as_secs_f64() * 1000.0,
            modality,
        };
        self.calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        record
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> LlmStats {
        let calls = self.calls.read().unwrap_or_else(|e| e.into_inner());
        let mut stats = LlmStats::default();
        let mut by_model: BTreeMap<&str, ModelUsage> = BTreeMap::new();
        let mut cost = 0.0;
        let mut latency = 0.0;

        for call in calls.iter() {
            stats.total_calls += 1;
            if call.modality == Modality::Vision {
                stats.vision_calls += 1;
            }
            stats.total_input_tokens += u64::from(call.input_tokens);
            stats.total_output_tokens += u64::from(call.output_tokens);
            cost += call.cost_usd;
            latency += call.latency_ms;

            let entry = by_model.entry(&call.model).or_insert_with(|| ModelUsage {
                model: call.model.clone(),
                calls: 0,
                input_tokens: 0,
                output_tokens: 0,
                cost_usd: 0.0,
            });
            entry.calls += 1;
            entry.input_tokens += u64::from(call.input_tokens);
            entry.output_tokens += u64::from(call.output_tokens);
            entry.cost_usd += call.cost_usd;
        }

        stats.total_cost = round_to(cost, 4);
        stats.total_latency_ms = round_to(latency, 2);
        stats.by_model = by_model.into_values().collect();
        stats
    }
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
