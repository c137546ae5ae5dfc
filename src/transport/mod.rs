//! Transport layer.
//!
//! The manager never speaks the WebSocket wire protocol itself. It drives a
//! [`TransportSocket`] and receives callbacks from it through a
//! [`TransportSink`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐  open / send / close   ┌────────────────────┐
//! │ ConnectionManager │───────────────────────►│  TransportSocket   │
//! │                   │                        │  (WebSocket engine)│
//! │   state + lock    │◄───────────────────────│                    │
//! └───────────────────┘  TransportSink::emit   └────────────────────┘
//!                        (worker task/thread)
//! ```
//!
//! # Callback Stream
//!
//! Every socket reports, in order:
//!
//! 1. `Opened` or `Failed`
//! 2. zero or more `Message`
//! 3. optionally `Closing` (peer sent a close frame)
//! 4. `Closed` or `Failed`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Per-socket event loop over `tokio-tungstenite` |
//! | `websocket` | [`WebSocketTransport`], the bundled implementation |

// ============================================================================
// Submodules
// ============================================================================

/// Per-socket event loop.
pub mod connection;

/// `tokio-tungstenite` backed [`TransportSocket`].
pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::config::HeaderConfig;
use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::WebSocketTransport;

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Opaque identifier of one transport-level socket.
///
/// Minted by the manager from the attempt's generation counter, so a handle
/// also identifies which connection attempt a callback belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    /// Creates a handle for the given generation.
    #[inline]
    #[must_use]
    pub(crate) const fn new(generation: u64) -> Self {
        Self(generation)
    }

    /// Returns the generation this handle was minted for.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ============================================================================
// OpenRequest
// ============================================================================

/// Everything a transport needs to open a socket.
///
/// Built from the configuration snapshot taken at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Target URL (`ws` or `wss` scheme).
    pub url: Url,
    /// Handshake headers, in order.
    pub headers: HeaderConfig,
}

// ============================================================================
// Descriptor
// ============================================================================

/// Summary of a successful opening handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    /// HTTP status of the upgrade response (normally 101).
    pub status: u16,
    /// Canonical reason phrase, if known.
    pub reason: Option<String>,
    /// Negotiated `Sec-WebSocket-Protocol`, if any.
    pub subprotocol: Option<String>,
    /// Response headers in the order received.
    pub headers: Vec<(String, String)>,
}

impl Descriptor {
    /// Creates a descriptor with only a status code.
    #[inline]
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Returns the first response header named `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(reason) = &self.reason {
            write!(f, " {reason}")?;
        }
        if let Some(protocol) = &self.subprotocol {
            write!(f, " (protocol: {protocol})")?;
        }
        Ok(())
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// A callback from the transport about one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened(Descriptor),
    /// Text frame received.
    Message(String),
    /// Peer sent a close frame.
    Closing {
        /// Close code sent by the peer.
        code: u16,
        /// Close reason sent by the peer.
        reason: String,
    },
    /// Socket fully closed.
    Closed {
        /// Final close code.
        code: u16,
        /// Final close reason.
        reason: String,
    },
    /// Socket failed; carries the underlying cause.
    Failed(String),
}

impl TransportEvent {
    /// Short name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Opened(_) => "opened",
            Self::Message(_) => "message",
            Self::Closing { .. } => "closing",
            Self::Closed { .. } => "closed",
            Self::Failed(_) => "failed",
        }
    }
}

// ============================================================================
// TransportSink
// ============================================================================

/// Callback target type behind a [`TransportSink`].
pub type EventCallback = Arc<dyn Fn(ConnectionHandle, TransportEvent) + Send + Sync>;

/// Channel through which a transport reports events for one socket.
///
/// Cloneable and callable from any thread.
#[derive(Clone)]
pub struct TransportSink {
    handle: ConnectionHandle,
    callback: EventCallback,
}

impl TransportSink {
    /// Creates a sink bound to `handle`.
    #[must_use]
    pub fn new(handle: ConnectionHandle, callback: EventCallback) -> Self {
        Self { handle, callback }
    }

    /// Returns the socket this sink reports for.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// Delivers an event.
    pub fn emit(&self, event: TransportEvent) {
        (self.callback)(self.handle, event);
    }
}

impl fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSink")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TransportSocket
// ============================================================================

/// Wire-level WebSocket engine consumed by the manager.
///
/// Every method must hand work off and return without waiting on the
/// network. Implementations are shared between threads and must be
/// internally synchronized.
pub trait TransportSocket: Send + Sync + 'static {
    /// Starts opening a socket identified by `handle`.
    ///
    /// The outcome is reported through `sink`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`](crate::Error::InvalidArgument) if the
    ///   request cannot be turned into a handshake
    /// - [`Error::TransportFailure`](crate::Error::TransportFailure) if the
    ///   transport cannot start the attempt
    fn open(&self, handle: ConnectionHandle, request: OpenRequest, sink: TransportSink)
    -> Result<()>;

    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is unknown or already gone.
    fn send(&self, handle: ConnectionHandle, text: String) -> Result<()>;

    /// Starts the closing handshake with `code` and `reason`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is unknown or already gone.
    fn close(&self, handle: ConnectionHandle, code: u16, reason: &str) -> Result<()>;
}

impl<T: TransportSocket + ?Sized> TransportSocket for Arc<T> {
    fn open(
        &self,
        handle: ConnectionHandle,
        request: OpenRequest,
        sink: TransportSink,
    ) -> Result<()> {
        (**self).open(handle, request, sink)
    }

    fn send(&self, handle: ConnectionHandle, text: String) -> Result<()> {
        (**self).send(handle, text)
    }

    fn close(&self, handle: ConnectionHandle, code: u16, reason: &str) -> Result<()> {
        (**self).close(handle, code, reason)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    #[test]
    fn test_handle_display() {
        let handle = ConnectionHandle::new(7);
        assert_eq!(handle.to_string(), "conn-7");
        assert_eq!(handle.generation(), 7);
    }

    #[test]
    fn test_descriptor_display() {
        let mut descriptor = Descriptor::new(101);
        assert_eq!(descriptor.to_string(), "HTTP 101");

        descriptor.reason = Some("Switching Protocols".into());
        descriptor.subprotocol = Some("chat".into());
        assert_eq!(
            descriptor.to_string(),
            "HTTP 101 Switching Protocols (protocol: chat)"
        );
    }

    #[test]
    fn test_descriptor_header_lookup() {
        let descriptor = Descriptor {
            headers: vec![("Upgrade".into(), "websocket".into())],
            ..Descriptor::new(101)
        };
        assert_eq!(descriptor.header("upgrade"), Some("websocket"));
        assert_eq!(descriptor.header("connection"), None);
    }

    #[test]
    fn test_sink_tags_events_with_handle() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = TransportSink::new(
            ConnectionHandle::new(3),
            Arc::new(move |handle, event| seen_clone.lock().push((handle, event))),
        );

        sink.emit(TransportEvent::Message("hi".into()));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, ConnectionHandle::new(3));
        assert_eq!(seen[0].1.kind(), "message");
    }
}
