use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Bridge communication error: {0}")]
    Bridge(#[from] reqwest::Error),

    #[error("Bridge answered with status {0}")]
    BridgeStatus(reqwest::StatusCode),

    #[error("Bridge rejected state change: {0}")]
    BridgeRejected(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Startup configuration problems. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("setting {key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, PulseError>;
