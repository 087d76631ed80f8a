//! Domain error types.

/// A sink rejected a pushed record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("sink rejected {operation}: {message}")]
pub struct SinkError {
    pub operation: String,
    pub message: String,
}

impl SinkError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Top-level error type for chartreplay.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("input error: {reason}")]
    Input { reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReplayError {
    pub(crate) fn input(reason: impl Into<String>) -> Self {
        ReplayError::Input {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ReplayError::InvalidInput {
            reason: reason.into(),
        }
    }
}

impl From<&ReplayError> for std::process::ExitCode {
    fn from(err: &ReplayError) -> Self {
        let code: u8 = match err {
            ReplayError::Io(_) => 1,
            ReplayError::ConfigParse { .. } | ReplayError::ConfigInvalid { .. } => 2,
            ReplayError::Input { .. } | ReplayError::NoData { .. } => 3,
            ReplayError::InvalidInput { .. } => 4,
            ReplayError::Sink(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
