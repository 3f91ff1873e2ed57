use thiserror::Error;

/// Errors carried by [`AsyncValue::Error`](crate::AsyncValue::Error).
///
/// One error value is delivered to every subscriber of a readable and compared by change
/// detection.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The remote side rejected the call or the transport failed.
    #[error("remote call `{method}` failed: {message}")]
    Remote { method: String, message: String },

    /// The remote side answered, but the requested record does not exist (yet).
    #[error("`{0}` was not found")]
    NotFound(String),

    /// The request payload could not be encoded.
    #[error("failed to encode payload of `{method}`: {message}")]
    Encode { method: String, message: String },

    /// The response payload did not have the expected shape.
    #[error("failed to decode response of `{method}`: {message}")]
    Decode { method: String, message: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The owning store has been dropped.
    #[error("store is closed")]
    Closed,
}

impl SyncError {
    pub fn remote(method: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SyncError::Remote {
            method: method.into(),
            message: message.to_string(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
