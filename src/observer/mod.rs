//! Lifecycle notifications.
//!
//! The manager reports every connection transition to one [`Observer`].
//! Hooks are always invoked from a single dispatcher task, one at a time and
//! in transition order, so observers need no locking of their own.
//!
//! # Example
//!
//! ```
//! use ws_connector::{Descriptor, Observer};
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
//! ```
//!
//! A `tokio::sync::mpsc::UnboundedSender<Notification>` is itself an
//! observer, for callers that prefer to drain events on their own loop.

// ============================================================================
// Submodules
// ============================================================================

/// Single-consumer delivery queue.
pub(crate) mod dispatcher;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::transport::Descriptor;

// ============================================================================
// Observer
// ============================================================================

/// Receiver of connection lifecycle notifications.
///
/// All hooks default to doing nothing.
pub trait Observer: Send + Sync + 'static {
    /// The opening handshake completed.
    fn on_connected(&self, descriptor: &Descriptor) {
        let _ = descriptor;
    }

    /// The connection is fully closed.
    fn on_disconnected(&self, reason: &str) {
        let _ = reason;
    }

    /// A text message arrived.
    fn on_message_received(&self, message: &str) {
        let _ = message;
    }

    /// The transport reported a failure.
    fn on_error_occurred(&self, message: &str) {
        let _ = message;
    }
}

impl<T: Observer + ?Sized> Observer for Arc<T> {
    fn on_connected(&self, descriptor: &Descriptor) {
        (**self).on_connected(descriptor);
    }

    fn on_disconnected(&self, reason: &str) {
        (**self).on_disconnected(reason);
    }

    fn on_message_received(&self, message: &str) {
        (**self).on_message_received(message);
    }

    fn on_error_occurred(&self, message: &str) {
        (**self).on_error_occurred(message);
    }
}

impl Observer for mpsc::UnboundedSender<Notification> {
    fn on_connected(&self, descriptor: &Descriptor) {
        let _ = self.send(Notification::Connected(descriptor.clone()));
    }

    fn on_disconnected(&self, reason: &str) {
        let _ = self.send(Notification::Disconnected(reason.to_string()));
    }

    fn on_message_received(&self, message: &str) {
        let _ = self.send(Notification::MessageReceived(message.to_string()));
    }

    fn on_error_occurred(&self, message: &str) {
        let _ = self.send(Notification::ErrorOccurred(message.to_string()));
    }
}

// ============================================================================
// Notification
// ============================================================================

/// A named lifecycle event.
///
/// Serializes as `{"event": "<name>", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum Notification {
    /// See [`Observer::on_connected`].
    Connected(Descriptor),
    /// See [`Observer::on_disconnected`].
    Disconnected(String),
    /// See [`Observer::on_message_received`].
    MessageReceived(String),
    /// See [`Observer::on_error_occurred`].
    ErrorOccurred(String),
}

impl Notification {
    /// Returns the event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "Connected",
            Self::Disconnected(_) => "Disconnected",
            Self::MessageReceived(_) => "MessageReceived",
            Self::ErrorOccurred(_) => "ErrorOccurred",
        }
    }

    /// Invokes the matching hook on `observer`.
    pub fn deliver(&self, observer: &dyn Observer) {
        match self {
            Self::Connected(descriptor) => observer.on_connected(descriptor),
            Self::Disconnected(reason) => observer.on_disconnected(reason),
            Self::MessageReceived(message) => observer.on_message_received(message),
            Self::ErrorOccurred(message) => observer.on_error_occurred(message),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
