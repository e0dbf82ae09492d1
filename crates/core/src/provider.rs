//! Provider trait — the abstraction over the reasoning oracle.
//!
//! A Provider knows how to send a short conversation (system instruction plus
//! user payload, optionally with an image) to a model and get text back.
//!
//! Implementations: Anthropic Messages API, OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-3-5-haiku-20241022", "gpt-4o-mini")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.0
}

impl ProviderRequest {
    /// Whether any message in this request carries an image.
    pub fn has_images(&self) -> bool {
        self.messages.iter().any(Message::has_images)
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The decision engine calls `complete()` without knowing which backend is
/// answering.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Whether this provider accepts image attachments.
    fn supports_vision(&self) -> bool {
        false
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ImageAttachment;

    #[test]
    fn provider_request_defaults() {
        let req: ProviderRequest = serde_json::from_str(r#"{"model":"m","messages":[]}"#).unwrap();
        assert!(req.temperature.abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
        assert!(!req.has_images());
    }

    #[test]
    fn request_detects_images() {
        let req = ProviderRequest {
            model: "m".into(),
            messages: vec![
                Message::system("rules"),
                Message::user("look").with_image(ImageAttachment::png("AAAA")),
            ],
            temperature: 0.0,
            max_tokens: Some(1024),
        };
        assert!(req.has_images());
    }
}
