//! Core error types.

use thiserror::Error;

/// Errors from the transition engine and table definitions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No entry for the action in the current state nor in the wildcard row.
    #[error("bad transition: no action '{action}' in state '{state}'")]
    BadTransition { state: String, action: String },

    #[error("invalid table definition: {reason}")]
    InvalidDefinition { reason: String },

    #[error("unknown handler '{name}' referenced by '{state}' on '{action}'")]
    UnknownHandler {
        name: String,
        state: String,
        action: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CoreError {
    /// Returns true if this error was raised by `dispatch`.
    pub fn is_bad_transition(&self) -> bool {
        matches!(self, CoreError::BadTransition { .. })
    }

    /// Returns a stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::BadTransition { .. } => "BAD_TRANSITION",
            CoreError::InvalidDefinition { .. } => "INVALID_DEFINITION",
            CoreError::UnknownHandler { .. } => "UNKNOWN_HANDLER",
            CoreError::Json(_) => "BAD_REQUEST",
            CoreError::Yaml(_) => "BAD_REQUEST",
        }
    }
}
