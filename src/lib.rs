//! WS Connector - Hardened single-connection WebSocket client.
//!
//! This library manages one WebSocket client connection at a time: it
//! opens the connection with caller-supplied handshake headers, sends text
//! messages, closes cleanly, and reports every lifecycle transition to an
//! observer.
//!
//! # Architecture
//!
//! The manager owns a state machine and drives a pluggable transport:
//!
//! - **Manager**: validates every call against the current state, under one lock
//! - **Transport**: performs the handshake and frame I/O on background tasks
//! - **Dispatcher**: delivers notifications to the observer, one at a time
//!
//! Key design principles:
//!
//! - Every attempt gets a fresh [`ConnectionHandle`]; callbacks from older
//!   attempts are discarded
//! - Calls made in the wrong state return an error instead of being ignored
//! - `is_connected` is lock-free and always consistent with notifications
//! - Dropping the manager closes the connection and silences the observer
//!
//! # Quick Start
//!
//! ```no_run
//! use ws_connector::{ConnectionManager, Descriptor, HeaderConfig, Observer, Result};
//!
//! struct Printer;
//!
//! impl Observer for Printer {
//!     fn on_connected(&self, descriptor: &Descriptor) {
//!         println!("connected: {descriptor}");
//!     }
//!
//!     fn on_message_received(&self, message: &str) {
//!         println!("<- {message}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::builder()
//!         .websocket()
//!         .observer(Printer)
//!         .headers(HeaderConfig::new().with("Authorization", "Bearer token1")?)
//!         .build()?;
//!
//!     manager.connect("wss://example.com/socket")?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`HeaderConfig`] and [`ConnectorOptions`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`manager`] | [`ConnectionManager`] and its state machine |
//! | [`observer`] | [`Observer`] hooks and [`Notification`] |
//! | [`transport`] | Transport contract and [`WebSocketTransport`] |
//!
//! # Features
//!
//! - **`rustls`**: enables `wss://` through rustls with webpki roots

// ============================================================================
// Modules
// ============================================================================

/// Handshake headers and manager options.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Connection manager and state machine.
///
/// Use [`ConnectionManager::builder()`] to create a configured manager.
pub mod manager;

/// Lifecycle notifications.
pub mod observer;

/// Transport contract and the bundled WebSocket implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Config types
pub use config::{
    ABNORMAL_CLOSURE, ConnectorOptions, HeaderConfig, MAX_CLOSE_REASON_BYTES, NO_STATUS_RECEIVED,
    NORMAL_CLOSURE,
};

// Error types
pub use error::{Error, Result};

// Manager types
pub use manager::{ConnectionManager, ConnectionManagerBuilder, ConnectionState};

// Observer types
pub use observer::{Notification, Observer};

// Transport types
pub use transport::{
    ConnectionHandle, Descriptor, EventCallback, OpenRequest, TransportEvent, TransportSink,
    TransportSocket, WebSocketTransport,
};
