//! Connection manager.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Owns one connection and reports its lifecycle |
//! | [`ConnectionManagerBuilder`] | Fluent configuration builder |
//! | [`ConnectionState`] | Lifecycle state |
//!
//! # Operations
//!
//! | Operation | Allowed in | Otherwise |
//! |-----------|------------|-----------|
//! | `connect` | Idle, Closed, Failed | `AlreadyConnecting` / `AlreadyOpen` |
//! | `send` | Open | `NotConnected` |
//! | `disconnect` | Connecting (queued), Open, Closing (no-op) | `NotConnected` |
//! | `teardown` | any | never fails |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for [`ConnectionManager`].
pub mod builder;

/// Core manager implementation.
pub mod core;

/// Lifecycle states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionManagerBuilder;
pub use core::ConnectionManager;
pub use state::ConnectionState;
