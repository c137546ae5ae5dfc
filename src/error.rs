//! Error types for the connection manager.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_connector::{ConnectionManager, Result};
//!
//! fn greet(manager: &ConnectionManager) -> Result<()> {
//!     manager.send("hello")?;
//!     manager.disconnect()?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Misuse | [`Error::InvalidArgument`], [`Error::AlreadyConnecting`], [`Error::AlreadyOpen`], [`Error::NotConnected`], [`Error::ShutDown`] |
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::TransportFailure`] |
//! | External | [`Error::Json`] |
//!
//! Misuse errors are returned synchronously by the operation that caused
//! them. Failures that happen after a hand-off to the transport are only
//! reported through [`Observer::on_error_occurred`](crate::Observer::on_error_occurred).

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Misuse Errors
    // ========================================================================
    /// Malformed URL or header.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// `connect` called while a previous attempt is still connecting.
    #[error("Connection attempt already in progress")]
    AlreadyConnecting,

    /// `connect` called while a connection is open or closing.
    #[error("Connection already open")]
    AlreadyOpen,

    /// `send` or `disconnect` called without an open connection.
    #[error("WebSocket is not connected")]
    NotConnected,

    /// The manager has been torn down and accepts no new connections.
    #[error("Connection manager has been shut down")]
    ShutDown,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the manager or transport cannot be built.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The underlying socket rejected an operation.
    #[error("Transport failure: {message}")]
    TransportFailure {
        /// Underlying cause reported by the transport.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transport failure.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the caller invoked an operation out of turn or with
    /// bad input.
    #[inline]
    #[must_use]
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::AlreadyConnecting
                | Self::AlreadyOpen
                | Self::NotConnected
                | Self::ShutDown
        )
    }

    /// Returns `true` if the error originated in the transport layer.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
