//! Error types for fraghand.
//!
//! The taxonomy mirrors how failures reach the user:
//! - transport failures (request failed, body is not an envelope)
//! - application failures (`status == false`, content carries the reason)
//! - configuration errors (fatal when a component is attached)
//!
//! Queue-size violations are not errors at all; the upload workflow evicts
//! silently.

use thiserror::Error;

/// Errors produced while reading or building a response envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Body is not JSON or does not have the envelope shape.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An additional attribute would shadow one of the envelope's own keys.
    #[error("attribute '{0}' collides with a reserved envelope key")]
    ReservedKey(String),
}

/// A request that never produced a usable envelope.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request itself failed (network, HTTP status, aborted upload).
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The server answered, but not with a valid envelope.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// A required construction option is missing or malformed.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid component options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("missing required option '{0}'")]
    Missing(&'static str),

    #[error("option '{option}' is invalid: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },
}

/// Umbrella error for component handler operations.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server handled the request and reported failure.
    #[error("server reported failure: {0}")]
    Application(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The component's fragment was replaced; it accepts no further calls.
    #[error("component '{0}' has been replaced")]
    Replaced(String),
}

impl From<EnvelopeError> for HandlerError {
    fn from(err: EnvelopeError) -> Self {
        HandlerError::Transport(TransportError::Envelope(err))
    }
}

/// Result type alias using HandlerError.
pub type Result<T> = std::result::Result<T, HandlerError>;
