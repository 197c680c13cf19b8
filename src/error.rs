//! Error types for the array runtime

use thiserror::Error;

/// Main error type for the array runtime.
///
/// Built-in algorithms never recover from these internally; every error is
/// propagated to the caller immediately. The embedding dispatch layer is
/// expected to convert them into language-level exception objects.
#[derive(Debug, Clone, Error)]
pub enum JsError {
    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    /// Invariant violation inside the runtime itself. Seeing this is a bug.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JsError {
    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        JsError::Internal(message.into())
    }

    /// Check whether this is a TypeError-class failure.
    pub fn is_type_error(&self) -> bool {
        matches!(self, JsError::TypeError { .. })
    }

    /// Check whether this is a RangeError-class failure.
    pub fn is_range_error(&self) -> bool {
        matches!(self, JsError::RangeError { .. })
    }
}
