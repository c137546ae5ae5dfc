//! Per-socket event loop.
//!
//! Each socket opened by [`WebSocketTransport`](super::WebSocketTransport)
//! is driven by one tokio task that:
//!
//! - Performs the opening handshake under the connect timeout
//! - Forwards inbound text frames as [`TransportEvent::Message`]
//! - Writes outbound frames queued through [`Connection`]
//! - Runs the closing handshake and reports the final outcome
//!
//! The task reports exactly one terminal event (`Closed` or `Failed`).

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::client::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, trace, warn};

use crate::config::options::truncate_close_reason;
use crate::config::{ABNORMAL_CLOSURE, ConnectorOptions, NO_STATUS_RECEIVED};
use crate::error::{Error, Result};

use super::{Descriptor, TransportEvent, TransportSink};

// ============================================================================
// SocketCommand
// ============================================================================

/// Commands for the socket task.
#[derive(Debug)]
enum SocketCommand {
    /// Write a text frame.
    Send(String),
    /// Start the closing handshake.
    Close { code: u16, reason: String },
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to a running socket task.
///
/// Dropping every `Connection` for a socket closes its command channel,
/// which makes the task close the socket and exit.
#[derive(Debug, Clone)]
pub(crate) struct Connection {
    command_tx: mpsc::UnboundedSender<SocketCommand>,
}

impl Connection {
    /// Spawns the socket task on `runtime`.
    ///
    /// `on_exit` runs once the socket is finished, right before the terminal
    /// event is emitted.
    pub(crate) fn spawn(
        runtime: &Handle,
        request: Request,
        sink: TransportSink,
        options: ConnectorOptions,
        on_exit: impl FnOnce() + Send + 'static,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        runtime.spawn(async move {
            let outcome = run_socket(request, command_rx, &sink, &options).await;
            on_exit();
            sink.emit(outcome);
        });

        Self { command_tx }
    }

    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] if the socket task has exited.
    pub(crate) fn send(&self, text: String) -> Result<()> {
        self.command_tx
            .send(SocketCommand::Send(text))
            .map_err(|_| Error::transport("Socket task has terminated"))
    }

    /// Queues a close frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] if the socket task has exited.
    pub(crate) fn close(&self, code: u16, reason: &str) -> Result<()> {
        self.command_tx
            .send(SocketCommand::Close {
                code,
                reason: truncate_close_reason(reason).to_string(),
            })
            .map_err(|_| Error::transport("Socket task has terminated"))
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Drives one socket from handshake to close, returning the terminal event.
async fn run_socket(
    request: Request,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    sink: &TransportSink,
    options: &ConnectorOptions,
) -> TransportEvent {
    let handle = sink.handle();

    let ws_stream = match timeout(options.connect_timeout, connect_async(request)).await {
        Ok(Ok((stream, response))) => {
            let descriptor = describe(&response);
            info!(%handle, status = descriptor.status, "WebSocket connection established");
            sink.emit(TransportEvent::Opened(descriptor));
            stream
        }
        Ok(Err(e)) => {
            warn!(%handle, error = %e, "WebSocket handshake failed");
            return TransportEvent::Failed(handshake_error(&e));
        }
        Err(_) => {
            let timeout_ms = options.connect_timeout.as_millis();
            warn!(%handle, timeout_ms, "WebSocket handshake timed out");
            return TransportEvent::Failed(format!("Connection timeout after {timeout_ms}ms"));
        }
    };

    let (mut ws_write, mut ws_read) = ws_stream.split();

    let mut peer_close: Option<(u16, String)> = None;
    let mut local_close: Option<(u16, String)> = None;
    let mut close_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            // Inbound frames
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(%handle, len = text.len(), "Text frame received");
                        sink.emit(TransportEvent::Message(text.as_str().to_owned()));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                        debug!(%handle, code, reason = %reason, "Close frame received");

                        if local_close.is_none() && peer_close.is_none() {
                            sink.emit(TransportEvent::Closing {
                                code,
                                reason: reason.clone(),
                            });
                        }
                        peer_close = Some((code, reason));
                    }

                    Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                        debug!(%handle, "WebSocket stream ended");
                        break;
                    }

                    Some(Err(e)) => {
                        if local_close.is_some() || peer_close.is_some() {
                            debug!(%handle, error = %e, "Error during closing handshake");
                            break;
                        }
                        warn!(%handle, error = %e, "WebSocket read failed");
                        return TransportEvent::Failed(e.to_string());
                    }

                    // Binary, Ping, Pong and raw frames are not forwarded
                    Some(Ok(_)) => {}
                }
            }

            // Commands from the transport
            command = command_rx.recv() => {
                match command {
                    Some(SocketCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            if local_close.is_some() || peer_close.is_some() {
                                debug!(%handle, error = %e, "Dropped frame sent while closing");
                                continue;
                            }
                            warn!(%handle, error = %e, "WebSocket write failed");
                            return TransportEvent::Failed(e.to_string());
                        }
                    }

                    Some(SocketCommand::Close { code, reason }) => {
                        if local_close.is_some() {
                            continue;
                        }
                        debug!(%handle, code, "Sending close frame");

                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.clone().into(),
                        };
                        if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
                            debug!(%handle, error = %e, "Close frame not sent");
                        }

                        local_close = Some((code, reason));
                        close_deadline = Some(Instant::now() + options.close_timeout);
                    }

                    None => {
                        debug!(%handle, "Command channel closed");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }

            // Peer never answered our close frame
            _ = sleep_until(close_deadline.unwrap_or_else(Instant::now)), if close_deadline.is_some() => {
                debug!(%handle, "Closing handshake timed out");
                break;
            }
        }
    }

    let (code, reason) = peer_close
        .or(local_close)
        .unwrap_or_else(|| (ABNORMAL_CLOSURE, String::new()));

    debug!(%handle, code, "Socket task terminated");

    TransportEvent::Closed { code, reason }
}

// ============================================================================
// Helpers
// ============================================================================

/// Summarises the upgrade response.
fn describe(response: &Response) -> Descriptor {
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let subprotocol = response
        .headers()
        .get("sec-websocket-protocol")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    Descriptor {
        status: response.status().as_u16(),
        reason: response.status().canonical_reason().map(str::to_owned),
        subprotocol,
        headers,
    }
}

/// Formats a handshake error for the observer.
fn handshake_error(error: &WsError) -> String {
    match error {
        WsError::Http(response) => {
            format!("Handshake rejected with HTTP {}", response.status())
        }
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
