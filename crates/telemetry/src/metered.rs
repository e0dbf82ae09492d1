//! A [`Provider`] wrapper that records every call in a [`UsageLedger`].

use crate::ledger::{Modality, UsageLedger};
use async_trait::async_trait;
use gauntlet_core::error::ProviderError;
use gauntlet_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

pub struct MeteredProvider {
    inner: Arc<dyn Provider>,
    ledger: Arc<UsageLedger>,
}

impl MeteredProvider {
    pub fn new(inner: Arc<dyn Provider>, ledger: Arc<UsageLedger>) -> Self {
        Self { inner, ledger }
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }
}

#[async_trait]
impl Provider for MeteredProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn supports_vision(&self) -> bool {
        self.inner.supports_vision()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let modality = if request.has_images() {
            Modality::Vision
        } else {
            Modality::Text
        };
        let requested_model = request.model.clone();
        let started = Instant::now();
        let response = self.inner.complete(request).await?;
        let latency = started.elapsed();

        let usage = response.usage.unwrap_or_default();
        let model = if response.model.is_empty() {
            requested_model.as_str()
        } else {
            response.model.as_str()
        };
        let record = self.ledger.record(
            model,
            usage.prompt_tokens,
            usage.completion_tokens,
            latency,
            modality,
        );
        debug!(
            model = %record.model,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            cost_usd = record.cost_usd,
            latency_ms = record.latency_ms,
            "Oracle call recorded"
        );
        Ok(response)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
