//! Transport errors.
//!
//! Two families exist. [`UsageError`] is returned synchronously when the
//! caller breaks a precondition and must not be retried. [`TransportError`]
//! describes asynchronous failures and is only ever delivered through the
//! `Error` notification.

use std::fmt;
use thiserror::Error;

use crate::state::ReadyState;

/// Category marker carried by every [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connect, write, or disconnect failure reported by a driver.
    Transport,
    /// Inbound data that the codec could not decode.
    Decode,
}

impl ErrorKind {
    /// Get the marker as a static string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "TransportError",
            ErrorKind::Decode => "DecodeError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Optional detail: protocol context or the underlying cause.
    pub description: Option<String>,
}

impl TransportError {
    /// Create a transport-category error.
    #[must_use]
    pub fn transport(message: impl Into<String>, description: Option<String>) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: message.into(),
            description,
        }
    }

    /// Create a decode-category error from a codec failure.
    #[must_use]
    pub fn decode(cause: &tether_protocol::ProtocolError) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: "parser error".to_string(),
            description: Some(cause.to_string()),
        }
    }

    /// Attach a description, replacing any existing one.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::transport("I/O error", None).with_description(e.to_string())
    }
}

/// Invalid use of the transport API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsageError {
    /// Packets were sent while the transport was not open.
    #[error("Transport not open (state: {0})")]
    NotOpen(ReadyState),
}
