//! Error types for the gauntlet domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error enum; [`Error`] wraps them.

use thiserror::Error;

/// The top-level error type for all gauntlet operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Oracle errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Environment errors ---
    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures reported by an [`Environment`](crate::environment::Environment).
///
/// `ElementNotFound`, `Ambiguous` and `Timeout` are the expected outcomes of a
/// failed interaction; the rest indicate a broken page or browser.
#[derive(Debug, Clone, Error)]
pub enum EnvironmentError {
    #[error("No element matched {0}")]
    ElementNotFound(String),

    #[error("Selector {0} is ambiguous")]
    Ambiguous(String),

    #[error("Timed out after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Snapshot capture failed: {0}")]
    Capture(String),

    #[error("Browser session closed: {0}")]
    Closed(String),
}

impl EnvironmentError {
    /// Whether this is one of the ordinary interaction failures
    /// (not found, ambiguous, timed out).
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound(_) | Self::Ambiguous(_) | Self::Timeout { .. }
        )
    }
}
