//! Connection configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`HeaderConfig`] | Ordered, validated handshake headers |
//! | [`ConnectorOptions`] | Timeouts and close reasons |

// ============================================================================
// Submodules
// ============================================================================

/// Ordered handshake header mapping.
pub mod headers;

/// Timeouts, close codes and close reasons.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use headers::HeaderConfig;
pub use options::{
    ABNORMAL_CLOSURE, ConnectorOptions, MAX_CLOSE_REASON_BYTES, NO_STATUS_RECEIVED, NORMAL_CLOSURE,
};
