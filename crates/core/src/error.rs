use thiserror::Error;

/// Configuration problems. Any of these aborts a run before the first
/// unit of work starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown chunking strategy: {0}")]
    UnknownStrategy(String),

    #[error("strategy {strategy}: missing parameter `{parameter}`")]
    MissingParameter { strategy: String, parameter: String },

    #[error("strategy {strategy}: invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        strategy: String,
        parameter: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
