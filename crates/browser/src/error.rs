use chromiumoxide::error::CdpError;
use gauntlet_core::error::EnvironmentError;

/// Errors raised while bringing the browser up or down.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("invalid browser configuration: {0}")]
    Config(String),

    #[error("failed to launch chromium: {0}")]
    Launch(String),

    #[error("devtools protocol error: {0}")]
    Cdp(#[from] CdpError),
}

impl From<BrowserError> for EnvironmentError {
    fn from(err: BrowserError) -> Self {
        EnvironmentError::Closed(err.to_string())
    }
}

/// Map a protocol error raised during `operation` onto the environment
/// taxonomy.
pub(crate) fn map_cdp(operation: &str, err: CdpError) -> EnvironmentError {
    match err {
        CdpError::Timeout => EnvironmentError::Timeout {
            operation: operation.to_string(),
            timeout_ms: 0,
        },
        CdpError::NotFound => EnvironmentError::ElementNotFound(operation.to_string()),
        CdpError::NoResponse => EnvironmentError::Closed(format!("{operation}: no response")),
        other => EnvironmentError::Script(format!("{operation}: {other}")),
    }
}
