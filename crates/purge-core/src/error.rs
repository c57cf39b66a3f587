//! Shared error type for identifier and input validation.
//!
//! Domain crates wrap this error; failures that only make sense in one
//! domain (storage, execution) live in that domain's error type.

/// The result type used throughout purge-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation errors raised by shared purge primitives.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An identifier or key did not have the expected form.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// What was wrong with it.
        message: String,
    },

    /// A request argument was out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Creates an invalid identifier error.
    #[must_use]
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }
}
