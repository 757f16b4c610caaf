//! Error types for Ferry.
//!
//! This module provides a unified error type for all Ferry operations,
//! with specific error variants for different failure modes.

use std::io;

use thiserror::Error;

use crate::session::{Phase, Role};

/// A specialized `Result` type for Ferry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Ferry.
#[derive(Error, Debug)]
pub enum Error {
    /// Backend rejected a command (E001)
    #[error("{command} failed: {message}")]
    Backend {
        /// Command that was issued
        command: &'static str,
        /// Error text reported by the engine
        message: String,
    },

    /// Ticket is empty or malformed (E002)
    #[error("invalid ticket: {0}")]
    InvalidTicket(String),

    /// Sharing was requested before anything was selected (E003)
    #[error("no file or directory selected")]
    NoResourceSelected,

    /// Event payload could not be parsed
    #[error("malformed payload for '{event}': {reason}")]
    MalformedPayload {
        /// Event name
        event: String,
        /// Why parsing failed
        reason: String,
    },

    /// Operation is not valid for this controller's role
    #[error("operation not available to the {0} role")]
    RoleMismatch(Role),

    /// Another session is still in flight
    #[error("a session is already {0}")]
    SessionActive(Phase),

    /// Lifecycle transition not permitted
    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current phase
        from: Phase,
        /// Requested phase
        to: Phase,
    },

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a rejected backend command.
    pub fn backend(command: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            command,
            message: message.into(),
        }
    }

    /// Returns the error code associated with this error, if any.
    ///
    /// Only errors surfaced to the user as alerts carry a code.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::Backend { .. } => Some("E001"),
            Self::InvalidTicket(_) => Some("E002"),
            Self::NoResourceSelected => Some("E003"),
            _ => None,
        }
    }

    /// Returns whether retrying the same command can succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
