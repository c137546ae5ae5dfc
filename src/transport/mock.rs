//! Recording transport for tests.
//!
//! Records every call and lets tests play the transport's side of the
//! callback stream by hand.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

use super::{ConnectionHandle, OpenRequest, TransportEvent, TransportSink, TransportSocket};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Open {
        handle: ConnectionHandle,
        url: String,
        headers: Vec<(String, String)>,
    },
    Send {
        handle: ConnectionHandle,
        text: String,
    },
    Close {
        handle: ConnectionHandle,
        code: u16,
        reason: String,
    },
}

#[derive(Default)]
pub(crate) struct MockTransport {
    calls: Mutex<Vec<Call>>,
    sinks: Mutex<FxHashMap<ConnectionHandle, TransportSink>>,
    open_failure: Mutex<Option<String>>,
    close_failure: Mutex<Option<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn sends(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Send { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn closes(&self) -> Vec<(ConnectionHandle, u16, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Close {
                    handle,
                    code,
                    reason,
                } => Some((*handle, *code, reason.clone())),
                _ => None,
            })
            .collect()
    }

    /// Handle passed to the most recent successful `open`.
    pub(crate) fn last_handle(&self) -> Option<ConnectionHandle> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            Call::Open { handle, .. } => Some(*handle),
            _ => None,
        })
    }

    /// Makes the next `open` fail synchronously.
    pub(crate) fn fail_next_open(&self, message: &str) {
        *self.open_failure.lock() = Some(message.to_string());
    }

    /// Makes every `close` fail synchronously.
    pub(crate) fn fail_closes(&self, message: &str) {
        *self.close_failure.lock() = Some(message.to_string());
    }

    /// Emits an event for `handle` as the transport would.
    pub(crate) fn emit(&self, handle: ConnectionHandle, event: TransportEvent) {
        let sink = self.sinks.lock().get(&handle).cloned();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }

    /// Emits an event for the most recent socket.
    pub(crate) fn emit_last(&self, event: TransportEvent) {
        let handle = self.last_handle().expect("no socket opened");
        self.emit(handle, event);
    }
}

impl TransportSocket for MockTransport {
    fn open(
        &self,
        handle: ConnectionHandle,
        request: OpenRequest,
        sink: TransportSink,
    ) -> Result<()> {
        if let Some(message) = self.open_failure.lock().take() {
            return Err(Error::transport(message));
        }

        self.sinks.lock().insert(handle, sink);
        self.calls.lock().push(Call::Open {
            handle,
            url: request.url.to_string(),
            headers: request
                .headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        });
        Ok(())
    }

    fn send(&self, handle: ConnectionHandle, text: String) -> Result<()> {
        self.calls.lock().push(Call::Send { handle, text });
        Ok(())
    }

    fn close(&self, handle: ConnectionHandle, code: u16, reason: &str) -> Result<()> {
        self.calls.lock().push(Call::Close {
            handle,
            code,
            reason: reason.to_string(),
        });
        match self.close_failure.lock().as_ref() {
            Some(message) => Err(Error::transport(message.clone())),
            None => Ok(()),
        }
    }
}
