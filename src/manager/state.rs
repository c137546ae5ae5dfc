//! Connection state machine states.
//!
//! ```text
//!            connect            opened              disconnect / peer close
//!   Idle ───────────► Connecting ──────► Open ─────────────────────► Closing
//!    ▲                    │                 │                            │
//!    │                    │ failed          │ failed                     │ closed
//!    │                    ▼                 ▼                            ▼
//!    │                 Failed ◄───────────────────────────────────── Closed
//!    │                    │          (connect again from either)        │
//!    └────────────────────┴─────────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// No connection has been attempted yet.
    #[default]
    Idle = 0,
    /// Opening handshake in progress.
    Connecting = 1,
    /// Connection is open; sends are accepted.
    Open = 2,
    /// Closing handshake in progress.
    Closing = 3,
    /// Connection closed cleanly (or torn down).
    Closed = 4,
    /// Last attempt failed.
    Failed = 5,
}

impl ConnectionState {
    /// Returns `true` for Connecting, Open and Closing.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Closing)
    }

    /// Returns `true` if a new `connect` is allowed from this state.
    #[inline]
    #[must_use]
    pub const fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Failed)
    }

    /// Encodes the state for the lock-free mirror.
    #[inline]
    pub(crate) const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a value written by [`as_u8`](Self::as_u8).
    #[inline]
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Closing,
            4 => Self::Closed,
            5 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConnectionState; 6] = [
        ConnectionState::Idle,
        ConnectionState::Connecting,
        ConnectionState::Open,
        ConnectionState::Closing,
        ConnectionState::Closed,
        ConnectionState::Failed,
    ];

    #[test]
    fn test_u8_mirror_round_trips() {
        for state in ALL {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_active_and_connectable_are_disjoint() {
        for state in ALL {
            assert_ne!(state.is_active(), state.can_connect(), "{state}");
        }
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }
}
