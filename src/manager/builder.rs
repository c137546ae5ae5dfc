//! Builder pattern for manager configuration.
//!
//! Provides a fluent API for configuring and creating [`ConnectionManager`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use ws_connector::{ConnectionManager, ConnectorOptions, HeaderConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> ws_connector::Result<()> {
//! let manager = ConnectionManager::builder()
//!     .websocket()
//!     .headers(HeaderConfig::new().with("Authorization", "Bearer token1")?)
//!     .options(ConnectorOptions::new().with_connect_timeout(Duration::from_secs(10)))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::{ConnectorOptions, HeaderConfig};
use crate::error::{Error, Result};
use crate::observer::Observer;
use crate::transport::{TransportSocket, WebSocketTransport};

use super::core::ConnectionManager;

// ============================================================================
// ConnectionManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`].
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ConnectionManagerBuilder {
    /// Explicit transport.
    transport: Option<Arc<dyn TransportSocket>>,
    /// Install a [`WebSocketTransport`] at build time.
    websocket: bool,
    /// Initial observer.
    observer: Option<Arc<dyn Observer>>,
    /// Initial handshake headers.
    headers: HeaderConfig,
    /// Timeouts and close reasons.
    options: ConnectorOptions,
    /// Runtime for background tasks; defaults to the current one.
    runtime: Option<Handle>,
}

// ============================================================================
// ConnectionManagerBuilder Implementation
// ============================================================================

impl ConnectionManagerBuilder {
    /// Creates a new builder with no transport.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport the manager drives.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl TransportSocket) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Uses the built-in tokio-tungstenite transport.
    ///
    /// The transport shares the manager's [`ConnectorOptions`].
    #[inline]
    #[must_use]
    pub fn websocket(mut self) -> Self {
        self.websocket = true;
        self
    }

    /// Sets the initial observer.
    #[inline]
    #[must_use]
    pub fn observer(mut self, observer: impl Observer) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Sets the initial handshake headers.
    #[inline]
    #[must_use]
    pub fn headers(mut self, headers: HeaderConfig) -> Self {
        self.headers = headers;
        self
    }

    /// Sets timeouts and close reasons.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ConnectorOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs background tasks on `runtime` instead of the current one.
    #[inline]
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the manager.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no transport was chosen, or both were
    /// - [`Error::Config`] if called outside a tokio runtime and no
    ///   [`runtime`](Self::runtime) was given
    pub fn build(self) -> Result<ConnectionManager> {
        let runtime = self.resolve_runtime()?;
        let transport = self.resolve_transport(&runtime)?;

        Ok(ConnectionManager::new(
            &runtime,
            transport,
            self.observer,
            self.headers,
            self.options,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionManagerBuilder {
    fn resolve_runtime(&self) -> Result<Handle> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.clone()),
            None => Handle::try_current().map_err(|e| {
                Error::config(format!(
                    "ConnectionManager needs a tokio runtime. \
                     Build it inside one or pass .runtime(handle): {e}"
                ))
            }),
        }
    }

    fn resolve_transport(&self, runtime: &Handle) -> Result<Arc<dyn TransportSocket>> {
        match (&self.transport, self.websocket) {
            (Some(_), true) => Err(Error::config(
                "Both .transport() and .websocket() were set. Choose one.",
            )),
            (Some(transport), false) => Ok(Arc::clone(transport)),
            (None, true) => Ok(Arc::new(WebSocketTransport::with_runtime(
                runtime.clone(),
                self.options.clone(),
            ))),
            (None, false) => Err(Error::config(
                "A transport is required. Use .websocket() or .transport() to set it.",
            )),
        }
    }
}

impl fmt::Debug for ConnectionManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManagerBuilder")
            .field("transport", &self.transport.is_some())
            .field("websocket", &self.websocket)
            .field("observer", &self.observer.is_some())
            .field("headers", &self.headers)
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::mock::MockTransport;

    #[test]
    fn test_build_without_transport_fails() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        let result = ConnectionManager::builder()
            .runtime(runtime.handle().clone())
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let result = ConnectionManager::builder()
            .transport(MockTransport::new())
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_rejects_two_transports() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let result = ConnectionManager::builder()
            .runtime(runtime.handle().clone())
            .transport(MockTransport::new())
            .websocket()
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_build_with_websocket_transport() {
        let headers = HeaderConfig::new().with("Auth", "token1").unwrap();
        let manager = ConnectionManager::builder()
            .websocket()
            .headers(headers)
            .build()
            .unwrap();

        assert_eq!(manager.headers().get("Auth"), Some("token1"));
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_debug_hides_trait_objects() {
        let builder = ConnectionManager::builder().websocket();
        let debug = format!("{builder:?}");
        assert!(debug.contains("websocket: true"));
        assert!(debug.contains("transport: false"));
    }
}
