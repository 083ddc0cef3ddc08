use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised at the input boundary.
///
/// Conversion itself never fails: malformed nodes and classes are skipped and
/// reported through [`crate::diagnostics::Diagnostics`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid JSON input: {0}")]
    InvalidJson(String),

    #[error("Invalid document: {reason}")]
    InvalidDocument { reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid breakpoint '{key}': {reason}")]
    InvalidBreakpoint { key: String, reason: String },
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::InvalidJson(err.to_string())
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(err: serde_yaml::Error) -> Self {
        EngineError::InvalidConfig(err.to_string())
    }
}
