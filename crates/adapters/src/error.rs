//! Adapter-level error type.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by transports and the adapters wrapping them.
///
/// The message carried by each variant is what the engine preserves verbatim
/// in the `details` of its terminal error log.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdapterError {
    /// A session could not be opened (unreachable host, bad credentials, …).
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote procedure or SQL statement itself failed.
    #[error("{0}")]
    Invocation(String),

    /// The call did not return within the configured timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The peer answered with something the transport could not understand.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Invocation(err.to_string())
        }
    }
}
