//! Core connection manager implementation.
//!
//! All state lives behind one mutex. Every transition, including the ones
//! triggered by transport callbacks, runs inside that lock and queues its
//! notification before releasing it, so delivery order matches transition
//! order. Transport calls always happen after the lock is released.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::{
    ABNORMAL_CLOSURE, ConnectorOptions, HeaderConfig, NO_STATUS_RECEIVED, NORMAL_CLOSURE,
};
use crate::error::{Error, Result};
use crate::observer::dispatcher::Dispatcher;
use crate::observer::{Notification, Observer};
use crate::transport::{
    ConnectionHandle, OpenRequest, TransportEvent, TransportSink, TransportSocket,
};

use super::builder::ConnectionManagerBuilder;
use super::state::ConnectionState;

// ============================================================================
// Types
// ============================================================================

/// Close request computed under the lock and issued after it.
struct CloseAction {
    handle: ConnectionHandle,
    code: u16,
    reason: String,
}

/// State guarded by the manager lock.
struct Inner {
    /// Current lifecycle state.
    state: ConnectionState,
    /// Attempt counter; each `connect` mints handle `generation + 1`.
    generation: u64,
    /// Socket of the current attempt; `None` once it is finished.
    handle: Option<ConnectionHandle>,
    /// Headers for the next attempt.
    headers: HeaderConfig,
    /// `disconnect` was called while connecting.
    close_queued: bool,
    /// Reason reported with the next `on_disconnected`.
    close_reason: Option<String>,
    /// Teardown has run.
    torn_down: bool,
}

/// State shared with transport callbacks.
struct Shared {
    transport: Arc<dyn TransportSocket>,
    dispatcher: Dispatcher,
    options: ConnectorOptions,
    /// Lock-free mirror of `Inner::state`.
    state_flag: AtomicU8,
    inner: Mutex<Inner>,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owns at most one WebSocket connection and reports its lifecycle.
///
/// Create one with [`ConnectionManager::builder()`].
///
/// # Thread Safety
///
/// `ConnectionManager` is `Send + Sync`. Every method returns after a short
/// local state check; network work is handed to the transport.
///
/// # Teardown
///
/// Dropping the manager runs [`teardown`](Self::teardown).
///
/// # Example
///
/// ```no_run
/// use ws_connector::{ConnectionManager, HeaderConfig, Notification, Result};
///
/// # async fn example() -> Result<()> {
/// let (events, mut rx) = tokio::sync::mpsc::unbounded_channel::<Notification>();
///
/// let manager = ConnectionManager::builder()
///     .websocket()
///     .observer(events)
///     .headers(HeaderConfig::new().with("Authorization", "Bearer token1")?)
///     .build()?;
///
/// manager.connect("wss://example.com/socket")?;
///
/// while let Some(event) = rx.recv().await {
///     if let Notification::Connected(_) = event {
///         manager.send("hello")?;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

// ============================================================================
// ConnectionManager - Construction
// ============================================================================

impl ConnectionManager {
    /// Returns a builder for configuring a manager.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Creates a manager and spawns its delivery task on `runtime`.
    pub(crate) fn new(
        runtime: &Handle,
        transport: Arc<dyn TransportSocket>,
        observer: Option<Arc<dyn Observer>>,
        headers: HeaderConfig,
        options: ConnectorOptions,
    ) -> Self {
        let shared = Arc::new(Shared {
            transport,
            dispatcher: Dispatcher::spawn(runtime, observer),
            options,
            state_flag: AtomicU8::new(ConnectionState::Idle.as_u8()),
            inner: Mutex::new(Inner {
                state: ConnectionState::Idle,
                generation: 0,
                handle: None,
                headers,
                close_queued: false,
                close_reason: None,
                torn_down: false,
            }),
        });

        debug!("Connection manager created");

        Self { shared }
    }
}

// ============================================================================
// ConnectionManager - Configuration
// ============================================================================

impl ConnectionManager {
    /// Replaces the handshake headers used by the next `connect`.
    ///
    /// An attempt that is already connecting or open keeps the headers it
    /// started with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a header name is empty or any
    /// pair is not a valid HTTP header. The stored headers are unchanged.
    pub fn set_headers<N, V>(&self, pairs: impl IntoIterator<Item = (N, V)>) -> Result<()>
    where
        N: Into<String>,
        V: Into<String>,
    {
        let headers = HeaderConfig::from_pairs(pairs)?;
        self.set_header_config(headers);
        Ok(())
    }

    /// Replaces the handshake headers with an already validated set.
    pub fn set_header_config(&self, headers: HeaderConfig) {
        debug!(count = headers.len(), "Headers updated");
        self.shared.inner.lock().headers = headers;
    }

    /// Inserts or replaces one handshake header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an invalid name or value.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.shared.inner.lock().headers.insert(name, value)
    }

    /// Returns a copy of the headers the next `connect` will use.
    #[must_use]
    pub fn headers(&self) -> HeaderConfig {
        self.shared.inner.lock().headers.clone()
    }

    /// Returns the manager options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectorOptions {
        &self.shared.options
    }

    /// Replaces the observer.
    ///
    /// Notifications queued before this call still go to the old observer.
    pub fn set_observer(&self, observer: impl Observer) {
        self.shared.dispatcher.set_observer(Arc::new(observer));
    }

    /// Removes the observer.
    pub fn clear_observer(&self) {
        self.shared.dispatcher.clear_observer();
    }
}

// ============================================================================
// ConnectionManager - Connection API
// ============================================================================

impl ConnectionManager {
    /// Starts connecting to `url` and returns immediately.
    ///
    /// The outcome arrives as [`Observer::on_connected`] or
    /// [`Observer::on_error_occurred`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `url` is malformed or not `ws`/`wss`
    /// - [`Error::AlreadyConnecting`] if an attempt is in progress
    /// - [`Error::AlreadyOpen`] if a connection is open or closing
    /// - [`Error::ShutDown`] after [`teardown`](Self::teardown)
    pub fn connect(&self, url: &str) -> Result<()> {
        let url = parse_ws_url(url)?;

        let (handle, request) = {
            let mut inner = self.shared.inner.lock();

            if inner.torn_down {
                return Err(Error::ShutDown);
            }

            if !inner.state.can_connect() {
                return Err(match inner.state {
                    ConnectionState::Connecting => Error::AlreadyConnecting,
                    _ => Error::AlreadyOpen,
                });
            }

            inner.generation += 1;
            let handle = ConnectionHandle::new(inner.generation);
            inner.handle = Some(handle);
            inner.close_queued = false;
            inner.close_reason = None;
            self.shared.set_state(&mut inner, ConnectionState::Connecting);

            let request = OpenRequest {
                url,
                headers: inner.headers.clone(),
            };
            (handle, request)
        };

        info!(%handle, url = %request.url, "Connecting");

        let sink = self.shared.sink(handle);
        if let Err(e) = self.shared.transport.open(handle, request, sink) {
            warn!(%handle, error = %e, "Transport rejected open");
            self.shared
                .handle_event(handle, TransportEvent::Failed(e.to_string()));
            return Ok(());
        }

        // Teardown may have taken the handle before the transport knew it
        let superseded = self.shared.inner.lock().handle != Some(handle);
        if superseded {
            debug!(%handle, "Attempt superseded during open, closing socket");
            if let Err(e) = self.shared.transport.close(
                handle,
                NORMAL_CLOSURE,
                &self.shared.options.teardown_reason,
            ) {
                debug!(%handle, error = %e, "Close of superseded socket failed");
            }
        }

        Ok(())
    }

    /// Hands a text message to the transport.
    ///
    /// Delivery is best effort and is not acknowledged.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless the connection is open
    /// - [`Error::TransportFailure`] if the transport refuses the frame
    pub fn send(&self, message: impl Into<String>) -> Result<()> {
        let handle = {
            let inner = self.shared.inner.lock();
            match (inner.state, inner.handle) {
                (ConnectionState::Open, Some(handle)) => handle,
                _ => return Err(Error::NotConnected),
            }
        };

        let message = message.into();
        trace!(%handle, len = message.len(), "Sending message");

        self.shared
            .transport
            .send(handle, message)
            .map_err(into_transport_failure)
    }

    /// Starts closing the connection with the normal-closure code.
    ///
    /// Called while connecting, the close is applied as soon as the
    /// connection opens (and dropped if the attempt fails). Called while
    /// already closing, it does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if there is no connection
    /// - [`Error::TransportFailure`] if the transport refuses the close; the
    ///   connection is then considered closed
    pub fn disconnect(&self) -> Result<()> {
        let action = {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                ConnectionState::Idle | ConnectionState::Closed | ConnectionState::Failed => {
                    return Err(Error::NotConnected);
                }
                ConnectionState::Connecting => {
                    inner.close_queued = true;
                    debug!(generation = inner.generation, "Disconnect queued until open");
                    return Ok(());
                }
                ConnectionState::Closing => return Ok(()),
                ConnectionState::Open => {
                    let Some(handle) = inner.handle else {
                        return Err(Error::NotConnected);
                    };
                    self.shared.begin_local_close(&mut inner, handle)
                }
            }
        };

        info!(handle = %action.handle, "Disconnecting");
        self.shared.issue_close(action).map_err(into_transport_failure)
    }

    /// Returns `true` if the connection is open.
    ///
    /// Lock-free; safe to call from any thread at any time.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.state_flag.load(Ordering::Acquire))
    }

    /// Closes any live connection and discards the observer.
    ///
    /// Runs automatically on drop. After teardown the manager stays
    /// `Closed`: `connect` returns [`Error::ShutDown`] and no further
    /// notifications are delivered. Never fails; repeated calls do nothing.
    pub fn teardown(&self) {
        let handle = {
            let mut inner = self.shared.inner.lock();
            if inner.torn_down {
                return;
            }
            inner.torn_down = true;
            inner.generation += 1;
            inner.close_queued = false;
            inner.close_reason = None;
            self.shared.set_state(&mut inner, ConnectionState::Closed);
            inner.handle.take()
        };

        self.shared.dispatcher.shutdown();

        if let Some(handle) = handle
            && let Err(e) = self.shared.transport.close(
                handle,
                NORMAL_CLOSURE,
                &self.shared.options.teardown_reason,
            )
        {
            debug!(%handle, error = %e, "Close during teardown failed");
        }

        info!("Connection manager torn down");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ============================================================================
// Shared - Transitions
// ============================================================================

impl Shared {
    fn set_state(&self, inner: &mut Inner, state: ConnectionState) {
        trace!(from = %inner.state, to = %state, "State transition");
        inner.state = state;
        self.state_flag.store(state.as_u8(), Ordering::Release);
    }

    /// Builds the callback sink for one attempt.
    ///
    /// Holds only a weak reference so live sockets do not keep the manager
    /// alive.
    fn sink(self: &Arc<Self>, handle: ConnectionHandle) -> TransportSink {
        let shared = Arc::downgrade(self);
        TransportSink::new(
            handle,
            Arc::new(move |handle, event| {
                if let Some(shared) = shared.upgrade() {
                    shared.handle_event(handle, event);
                }
            }),
        )
    }

    /// Moves an open connection to Closing for a user disconnect.
    fn begin_local_close(&self, inner: &mut Inner, handle: ConnectionHandle) -> CloseAction {
        let reason = self.options.close_reason.clone();
        inner.close_reason = Some(reason.clone());
        self.set_state(inner, ConnectionState::Closing);
        CloseAction {
            handle,
            code: NORMAL_CLOSURE,
            reason,
        }
    }

    /// Applies one transport callback.
    fn handle_event(&self, handle: ConnectionHandle, event: TransportEvent) {
        let action = {
            let mut inner = self.inner.lock();

            if inner.handle != Some(handle) {
                trace!(%handle, event = event.kind(), "Discarding stale callback");
                return;
            }

            self.apply_event(&mut inner, handle, event)
        };

        if let Some(action) = action
            && let Err(e) = self.issue_close(action)
        {
            debug!(%handle, error = %e, "Follow-up close failed");
        }
    }

    fn apply_event(
        &self,
        inner: &mut Inner,
        handle: ConnectionHandle,
        event: TransportEvent,
    ) -> Option<CloseAction> {
        match event {
            TransportEvent::Opened(descriptor) => {
                if inner.state != ConnectionState::Connecting {
                    warn!(%handle, state = %inner.state, "Unexpected opened callback");
                    return None;
                }

                info!(%handle, %descriptor, "Connected");
                self.set_state(inner, ConnectionState::Open);
                self.dispatcher.notify(Notification::Connected(descriptor));

                if inner.close_queued {
                    inner.close_queued = false;
                    debug!(%handle, "Applying queued disconnect");
                    return Some(self.begin_local_close(inner, handle));
                }
                None
            }

            TransportEvent::Message(text) => {
                if inner.state == ConnectionState::Open {
                    self.dispatcher.notify(Notification::MessageReceived(text));
                } else {
                    trace!(%handle, state = %inner.state, "Dropping message outside open state");
                }
                None
            }

            TransportEvent::Closing { code, reason } => {
                if !matches!(
                    inner.state,
                    ConnectionState::Connecting | ConnectionState::Open
                ) {
                    return None;
                }

                info!(%handle, code, reason = %reason, "Peer initiated close");
                inner.close_queued = false;
                inner.close_reason = Some(reason.clone());
                self.set_state(inner, ConnectionState::Closing);

                Some(CloseAction {
                    handle,
                    code: echo_code(code),
                    reason,
                })
            }

            TransportEvent::Closed { code, reason } => {
                if !inner.state.is_active() {
                    return None;
                }

                let reason = inner
                    .close_reason
                    .take()
                    .filter(|r| !r.is_empty())
                    .or_else(|| Some(reason).filter(|r| !r.is_empty()))
                    .unwrap_or_else(|| format!("Connection closed with code {code}"));

                info!(%handle, code, "Disconnected");
                inner.handle = None;
                inner.close_queued = false;
                self.set_state(inner, ConnectionState::Closed);
                self.dispatcher.notify(Notification::Disconnected(reason));
                None
            }

            TransportEvent::Failed(message) => {
                let was_open = matches!(
                    inner.state,
                    ConnectionState::Open | ConnectionState::Closing
                );

                warn!(%handle, error = %message, "Connection failed");
                inner.handle = None;
                inner.close_queued = false;
                inner.close_reason = None;
                self.set_state(inner, ConnectionState::Failed);

                self.dispatcher
                    .notify(Notification::ErrorOccurred(message.clone()));
                if was_open {
                    self.dispatcher.notify(Notification::Disconnected(message));
                }
                None
            }
        }
    }

    /// Sends a close to the transport; on refusal the connection is
    /// finished locally so it never stays half-closed.
    fn issue_close(&self, action: CloseAction) -> Result<()> {
        let CloseAction {
            handle,
            code,
            reason,
        } = action;

        if let Err(e) = self.transport.close(handle, code, &reason) {
            warn!(%handle, error = %e, "Transport refused close");
            self.handle_event(
                handle,
                TransportEvent::Closed {
                    code: ABNORMAL_CLOSURE,
                    reason: e.to_string(),
                },
            );
            return Err(e);
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses `url` and checks for a WebSocket scheme.
fn parse_ws_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| Error::invalid_argument(format!("Malformed URL {url:?}: {e}")))?;

    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(Error::invalid_argument(format!(
            "Unsupported URL scheme {other:?}, expected ws or wss"
        ))),
    }
}

/// Close code to send back for a peer close; reserved codes become 1000.
fn echo_code(code: u16) -> u16 {
    match code {
        NO_STATUS_RECEIVED | ABNORMAL_CLOSURE => NORMAL_CLOSURE,
        code => code,
    }
}

fn into_transport_failure(error: Error) -> Error {
    match error {
        Error::TransportFailure { .. } => error,
        other => Error::transport(other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
