use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream error: {status} {message}")]
    Upstream { status: u16, message: String },
    #[error("missing API key: set {0} in config or environment")]
    MissingKey(&'static str),
}

impl AdapterError {
    /// True for non-2xx responses from the upstream API, as opposed to
    /// transport or configuration failures.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AdapterError::Upstream { .. })
    }
}

/// Outcome of a single watchlist item's pipeline. Cancellation is a
/// distinguished signal, never surfaced as a failure.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("run cancelled")]
    Cancelled,
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
