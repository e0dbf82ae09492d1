//! Configuration loading, validation, and management for gauntlet.
//!
//! Loads configuration from `~/.gauntlet/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.gauntlet/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Oracle provider used for decisions
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Oracle model
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per oracle response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Run limits and controller thresholds
    #[serde(default)]
    pub run: RunConfig,

    /// Browser launch settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Usage and cost accounting
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-3-5-haiku-20241022".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("run", &self.run)
            .field("browser", &self.browser)
            .field("providers", &self.providers)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Limits and escalation thresholds for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Entry URL of the challenge site
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// Number of challenges that counts as full success
    #[serde(default = "default_max_challenges")]
    pub max_challenges: u32,

    /// Wall-clock budget for the whole run
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra time before the outer watchdog kills a run that ignores its deadline
    #[serde(default = "default_hard_timeout_grace_secs")]
    pub hard_timeout_grace_secs: u64,

    #[serde(default = "default_max_actions")]
    pub max_actions_per_challenge: u32,

    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,

    /// Text-modality failure streak at which decisions switch to screenshots
    #[serde(default = "default_vision_threshold")]
    pub vision_fallback_threshold: u32,

    #[serde(default = "default_true")]
    pub use_vision_fallback: bool,

    /// Age after which a stuck first challenge is force-advanced
    #[serde(default = "default_first_stall_secs")]
    pub first_challenge_stall_secs: u64,

    /// Click advance-style controls as soon as a success signal appears
    #[serde(default = "default_true")]
    pub auto_advance_on_success: bool,

    /// Path of the JSON run report
    #[serde(default = "default_output_file")]
    pub output_file: String,
}

fn default_target_url() -> String {
    "https://serene-frangipane-7fd25b.netlify.app".into()
}
fn default_max_challenges() -> u32 {
    30
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_hard_timeout_grace_secs() -> u64 {
    10
}
fn default_max_actions() -> u32 {
    8
}
fn default_max_failures() -> u32 {
    3
}
fn default_vision_threshold() -> u32 {
    3
}
fn default_first_stall_secs() -> u64 {
    90
}
fn default_output_file() -> String {
    "run_stats.json".into()
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Deadline for the outer watchdog around the whole run.
    pub fn hard_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs + self.hard_timeout_grace_secs)
    }

    pub fn first_challenge_stall(&self) -> Duration {
        Duration::from_secs(self.first_challenge_stall_secs)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            max_challenges: default_max_challenges(),
            timeout_secs: default_timeout_secs(),
            hard_timeout_grace_secs: default_hard_timeout_grace_secs(),
            max_actions_per_challenge: default_max_actions(),
            max_consecutive_failures: default_max_failures(),
            vision_fallback_threshold: default_vision_threshold(),
            use_vision_fallback: true,
            first_challenge_stall_secs: default_first_stall_secs(),
            auto_advance_on_success: true,
            output_file: default_output_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Chromium binary; autodetected when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
}

fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    900
}
fn default_navigation_timeout_ms() -> u64 {
    30_000
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Usage and cost accounting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Custom model pricing overrides (model name to pricing)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_pricing: HashMap::new(),
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.gauntlet/config.toml).
    ///
    /// API keys fall back to environment variables in this order:
    /// - `GAUNTLET_API_KEY`
    /// - `ANTHROPIC_API_KEY`
    /// - `OPENAI_API_KEY`
    /// - `OPENROUTER_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` so tests can inject
    /// variables without touching the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = ["GAUNTLET_API_KEY", "ANTHROPIC_API_KEY", "OPENAI_API_KEY", "OPENROUTER_API_KEY"]
                .iter()
                .find_map(|key| lookup(key).filter(|v| !v.is_empty()));
        }
        if let Some(provider) = lookup("GAUNTLET_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("GAUNTLET_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("GAUNTLET_TARGET_URL") {
            self.run.target_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".gauntlet")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let run = &self.run;
        let positive = [
            ("run.max_challenges", u64::from(run.max_challenges)),
            ("run.timeout_secs", run.timeout_secs),
            ("run.max_actions_per_challenge", u64::from(run.max_actions_per_challenge)),
            ("run.max_consecutive_failures", u64::from(run.max_consecutive_failures)),
            ("run.vision_fallback_threshold", u64::from(run.vision_fallback_threshold)),
            ("run.first_challenge_stall_secs", run.first_challenge_stall_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
        }

        if run.target_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("run.target_url must be set".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Resolve the API key for `provider`: provider-specific first, then global.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            run: RunConfig::default(),
            browser: BrowserConfig::default(),
            providers: HashMap::new(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
