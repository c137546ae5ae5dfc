//! `tokio-tungstenite` backed transport.
//!
//! Tracks live sockets keyed by [`ConnectionHandle`]. Each socket runs in
//! its own task (see [`connection`](super::connection)); this type only
//! builds handshake requests and routes commands.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │           WebSocketTransport             │
//! │  ┌────────────────────────────────────┐  │
//! │  │ conn-1 → Connection (task)         │  │
//! │  │ conn-2 → Connection (task)         │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! `wss://` URLs need the `rustls` feature.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::{debug, info};

use crate::config::{ConnectorOptions, HeaderConfig};
use crate::error::{Error, Result};

use super::connection::Connection;
use super::{ConnectionHandle, OpenRequest, TransportSink, TransportSocket};

// ============================================================================
// Types
// ============================================================================

/// Live sockets by handle.
type ConnectionMap = FxHashMap<ConnectionHandle, Connection>;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// [`TransportSocket`] implementation over `tokio-tungstenite`.
///
/// # Thread Safety
///
/// All methods take `&self`, never block on the network and may be called
/// from any thread, including threads outside the tokio runtime.
pub struct WebSocketTransport {
    /// Runtime the socket tasks are spawned on.
    runtime: Handle,
    /// Timeouts applied to every socket.
    options: ConnectorOptions,
    /// Live sockets (shared with their tasks for removal on exit).
    connections: Arc<Mutex<ConnectionMap>>,
}

// ============================================================================
// WebSocketTransport - Constructor
// ============================================================================

impl WebSocketTransport {
    /// Creates a transport with default options on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if called outside a tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_options(ConnectorOptions::default())
    }

    /// Creates a transport with custom options on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if called outside a tokio runtime.
    pub fn with_options(options: ConnectorOptions) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("WebSocketTransport needs a tokio runtime: {e}")))?;

        Ok(Self::with_runtime(runtime, options))
    }

    /// Creates a transport that spawns socket tasks on `runtime`.
    #[must_use]
    pub fn with_runtime(runtime: Handle, options: ConnectorOptions) -> Self {
        Self {
            runtime,
            options,
            connections: Arc::new(Mutex::new(ConnectionMap::default())),
        }
    }
}

// ============================================================================
// WebSocketTransport - Public API
// ============================================================================

impl WebSocketTransport {
    /// Returns the number of live sockets.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns the options applied to new sockets.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectorOptions {
        &self.options
    }

    fn connection(&self, handle: ConnectionHandle) -> Result<Connection> {
        self.connections
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(Error::NotConnected)
    }
}

// ============================================================================
// TransportSocket
// ============================================================================

impl TransportSocket for WebSocketTransport {
    fn open(
        &self,
        handle: ConnectionHandle,
        request: OpenRequest,
        sink: TransportSink,
    ) -> Result<()> {
        let client_request = build_request(&request)?;

        let mut connections = self.connections.lock();
        if connections.contains_key(&handle) {
            return Err(Error::transport(format!("Socket {handle} is already open")));
        }

        let registry: Weak<Mutex<ConnectionMap>> = Arc::downgrade(&self.connections);
        let connection = Connection::spawn(
            &self.runtime,
            client_request,
            sink,
            self.options.clone(),
            move || {
                if let Some(registry) = registry.upgrade() {
                    registry.lock().remove(&handle);
                }
            },
        );
        connections.insert(handle, connection);

        info!(%handle, url = %request.url, headers = request.headers.len(), "Opening WebSocket");
        Ok(())
    }

    fn send(&self, handle: ConnectionHandle, text: String) -> Result<()> {
        self.connection(handle)?.send(text)
    }

    fn close(&self, handle: ConnectionHandle, code: u16, reason: &str) -> Result<()> {
        debug!(%handle, code, "Close requested");
        self.connection(handle)?.close(code, reason)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        // Dropping the senders makes every socket task close and exit
        let drained: Vec<_> = self.connections.lock().drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "Dropping live sockets");
        }
    }
}

// ============================================================================
// Request Building
// ============================================================================

/// Builds the client handshake request with the header snapshot applied.
fn build_request(request: &OpenRequest) -> Result<Request> {
    let mut client_request = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::invalid_argument(format!("Invalid WebSocket URL: {e}")))?;

    apply_headers(&mut client_request, &request.headers)?;
    Ok(client_request)
}

/// Appends configured headers, replacing defaults with the same name.
fn apply_headers(client_request: &mut Request, headers: &HeaderConfig) -> Result<()> {
    let target = client_request.headers_mut();
    for (name, value) in headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::invalid_argument(format!("Invalid header name: {name:?}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::invalid_argument(format!("Invalid value for header {name}")))?;
        target.insert(name, value);
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::handshake::server::{Request as ServerRequest, Response};
    use url::Url;

    use crate::config::NORMAL_CLOSURE;
    use crate::transport::TransportEvent;

    const WAIT: Duration = Duration::from_secs(5);

    /// Spawns a one-shot echo server and returns its URL plus a receiver for
    /// the `Auth` header it saw.
    async fn echo_server() -> (Url, mpsc::UnboundedReceiver<Option<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let (header_tx, header_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let callback = |request: &ServerRequest, response: Response| {
                let auth = request
                    .headers()
                    .get("Auth")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let _ = header_tx.send(auth);
                Ok(response)
            };
            let mut ws = accept_hdr_async(stream, callback).await.expect("upgrade");

            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Text(text) => {
                        if ws.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // The close reply is flushed by the next read
                    _ => {}
                }
            }
        });

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/echo")).expect("url");
        (url, header_rx)
    }

    fn channel_sink(
        handle: ConnectionHandle,
    ) -> (TransportSink, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = TransportSink::new(
            handle,
            Arc::new(move |_, event| {
                let _ = tx.send(event);
            }),
        );
        (sink, rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("event within timeout")
            .expect("sink alive")
    }

    #[test]
    fn test_build_request_applies_headers() {
        let request = OpenRequest {
            url: Url::parse("ws://example.com/x").unwrap(),
            headers: HeaderConfig::from_pairs([("Auth", "token1"), ("X-Client", "tests")])
                .unwrap(),
        };

        let client_request = build_request(&request).expect("request");
        assert_eq!(client_request.uri().to_string(), "ws://example.com/x");
        assert_eq!(client_request.headers()["Auth"], "token1");
        assert_eq!(client_request.headers()["X-Client"], "tests");
        assert!(client_request.headers().contains_key("Sec-WebSocket-Key"));
    }

    #[tokio::test]
    async fn test_new_inside_runtime() {
        let transport = WebSocketTransport::new().expect("transport");
        assert_eq!(transport.connection_count(), 0);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = WebSocketTransport::new();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_send_to_unknown_handle() {
        let transport = WebSocketTransport::new().expect("transport");
        let result = transport.send(ConnectionHandle::new(42), "hello".into());
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let (url, mut header_rx) = echo_server().await;
        let transport = WebSocketTransport::new().expect("transport");
        let handle = ConnectionHandle::new(1);
        let (sink, mut events) = channel_sink(handle);

        let request = OpenRequest {
            url,
            headers: HeaderConfig::new().with("Auth", "token1").unwrap(),
        };
        transport.open(handle, request, sink).expect("open");

        match next_event(&mut events).await {
            TransportEvent::Opened(descriptor) => assert_eq!(descriptor.status, 101),
            other => panic!("expected opened, got {other:?}"),
        }
        assert_eq!(header_rx.recv().await.flatten().as_deref(), Some("token1"));

        transport.send(handle, "hello".into()).expect("send");
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Message("hello".into())
        );

        transport
            .close(handle, NORMAL_CLOSURE, "done")
            .expect("close");
        match next_event(&mut events).await {
            TransportEvent::Closed { .. } => {}
            other => panic!("expected closed, got {other:?}"),
        }

        assert_eq!(transport.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_refused_connection_reports_failure() {
        // Grab a free port, then release it so nothing listens there
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let transport = WebSocketTransport::new().expect("transport");
        let handle = ConnectionHandle::new(9);
        let (sink, mut events) = channel_sink(handle);
        let request = OpenRequest {
            url: Url::parse(&format!("ws://127.0.0.1:{port}")).unwrap(),
            headers: HeaderConfig::new(),
        };

        transport.open(handle, request, sink).expect("open hands off");

        assert!(matches!(
            next_event(&mut events).await,
            TransportEvent::Failed(_)
        ));
    }
}
