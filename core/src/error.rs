//! Error types for the starter API client.
//!
//! # Design
//! Two layers. `TransportError` is whatever went wrong before an HTTP
//! response existed; the client wraps it in `ApiError::Transport` without
//! reinterpreting it. Everything else is an application-level failure: the
//! server answered, but not with a usable envelope.

use thiserror::Error;

/// Message used when the server reports failure without saying why.
pub const FALLBACK_MESSAGE: &str = "request failed";

/// Failures raised by a `NetworkClient` implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be sent or no response arrived.
    #[error("{method} {url} failed: {message}")]
    Request {
        method: &'static str,
        url: String,
        message: String,
    },

    /// A response arrived but its body could not be read.
    #[error("reading response body from {url} failed: {message}")]
    Body { url: String, message: String },

    /// The transport itself could not be constructed.
    #[error("transport setup failed: {0}")]
    Client(String),
}

/// Errors returned by `StarterClient` operations and envelope unwrapping.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server returned an envelope with `success: false`.
    ///
    /// `status` is set when the envelope came with a non-2xx status.
    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    /// The server returned a non-2xx status without an envelope body.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// `success: true` but the payload the operation needs was absent.
    #[error("response did not include data")]
    MissingData,

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Build the application error for a failed envelope.
    pub fn from_server_message(status: Option<u16>, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        ApiError::Api { status, message }
    }

    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => *status,
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised while loading `ClientConfig` from the environment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}
