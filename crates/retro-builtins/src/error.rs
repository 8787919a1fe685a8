//! Builtin call errors

use retro_core::CapabilityError;
use retro_security::SecurityViolation;
use thiserror::Error;

/// Result type for builtin calls
pub type BuiltinResult = Result<retro_core::Value, BuiltinError>;

/// Errors raised while dispatching or running a builtin
#[derive(Debug, Clone, Error)]
pub enum BuiltinError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error(transparent)]
    Security(#[from] SecurityViolation),

    #[error("{name}() takes {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("{function}(): {message}")]
    InvalidArgument { function: String, message: String },

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("{function}() failed: {message}")]
    Failed { function: String, message: String },
}

impl BuiltinError {
    pub fn invalid(function: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
