//! Connection timing and close-reason options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use ws_connector::ConnectorOptions;
//!
//! let options = ConnectorOptions::new()
//!     .with_connect_timeout(Duration::from_secs(10))
//!     .with_close_reason("Leaving the lobby");
//!
//! assert_eq!(options.close_reason, "Leaving the lobby");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Close code sent for every locally initiated close (RFC 6455 normal closure).
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the peer closed without a status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Largest close reason a close frame can carry (125-byte payload minus the code).
pub const MAX_CLOSE_REASON_BYTES: usize = 123;

/// Default time allowed for the TCP + WebSocket handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time to wait for the peer to answer a close frame.
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Reason sent with [`ConnectionManager::disconnect`](crate::ConnectionManager::disconnect).
const DEFAULT_CLOSE_REASON: &str = "Disconnected by the user";

/// Reason sent when the manager is torn down with a live connection.
const DEFAULT_TEARDOWN_REASON: &str = "Connection manager torn down";

// ============================================================================
// ConnectorOptions
// ============================================================================

/// Options shared by the manager and the bundled WebSocket transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorOptions {
    /// Maximum duration of the opening handshake.
    pub connect_timeout: Duration,

    /// Maximum wait for the peer's close frame after a local close.
    pub close_timeout: Duration,

    /// Reason string sent by `disconnect`.
    pub close_reason: String,

    /// Reason string sent by teardown.
    pub teardown_reason: String,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectorOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            close_reason: DEFAULT_CLOSE_REASON.to_string(),
            teardown_reason: DEFAULT_TEARDOWN_REASON.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectorOptions {
    /// Sets the opening handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long a local close waits for the peer.
    #[inline]
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Sets the reason string sent by `disconnect`.
    ///
    /// Cut to [`MAX_CLOSE_REASON_BYTES`] at a character boundary.
    #[inline]
    #[must_use]
    pub fn with_close_reason(mut self, reason: impl Into<String>) -> Self {
        self.close_reason = clamp_close_reason(reason.into());
        self
    }

    /// Sets the reason string sent on teardown.
    ///
    /// Cut to [`MAX_CLOSE_REASON_BYTES`] at a character boundary.
    #[inline]
    #[must_use]
    pub fn with_teardown_reason(mut self, reason: impl Into<String>) -> Self {
        self.teardown_reason = clamp_close_reason(reason.into());
        self
    }
}

// ============================================================================
// Close Reasons
// ============================================================================

/// Returns the longest prefix of `reason` that fits in a close frame.
pub(crate) fn truncate_close_reason(reason: &str) -> &str {
    if reason.len() <= MAX_CLOSE_REASON_BYTES {
        return reason;
    }
    let mut end = MAX_CLOSE_REASON_BYTES;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

fn clamp_close_reason(mut reason: String) -> String {
    let len = truncate_close_reason(&reason).len();
    reason.truncate(len);
    reason
}

// ============================================================================
// Tests
// ============================================================================
