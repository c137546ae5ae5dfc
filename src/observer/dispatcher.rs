//! Single-consumer delivery queue.
//!
//! Notifications are queued from whichever thread applied the transition
//! and delivered by one tokio task, in queue order. Observer changes travel
//! through the same queue, so they take effect between notifications and
//! never in the middle of one.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{Notification, Observer};

// ============================================================================
// DispatchCommand
// ============================================================================

/// Items processed by the dispatcher task.
enum DispatchCommand {
    /// Deliver to the current observer.
    Notify(Notification),
    /// Replace the current observer.
    SetObserver(Arc<dyn Observer>),
    /// Drop the current observer.
    ClearObserver,
    /// Drop the observer and stop.
    Shutdown,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Sending side of the delivery queue.
pub(crate) struct Dispatcher {
    command_tx: mpsc::UnboundedSender<DispatchCommand>,
}

impl Dispatcher {
    /// Spawns the delivery task on `runtime`.
    pub(crate) fn spawn(runtime: &Handle, observer: Option<Arc<dyn Observer>>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_dispatcher(command_rx, observer));
        Self { command_tx }
    }

    /// Queues a notification.
    pub(crate) fn notify(&self, notification: Notification) {
        trace!(event = notification.name(), "Queueing notification");
        if self
            .command_tx
            .send(DispatchCommand::Notify(notification))
            .is_err()
        {
            trace!("Dispatcher stopped, notification dropped");
        }
    }

    /// Replaces the observer after already queued notifications.
    pub(crate) fn set_observer(&self, observer: Arc<dyn Observer>) {
        let _ = self.command_tx.send(DispatchCommand::SetObserver(observer));
    }

    /// Removes the observer after already queued notifications.
    pub(crate) fn clear_observer(&self) {
        let _ = self.command_tx.send(DispatchCommand::ClearObserver);
    }

    /// Stops the task once the queue drains, dropping the observer.
    pub(crate) fn shutdown(&self) {
        let _ = self.command_tx.send(DispatchCommand::Shutdown);
    }
}

// ============================================================================
// Delivery Loop
// ============================================================================

async fn run_dispatcher(
    mut command_rx: mpsc::UnboundedReceiver<DispatchCommand>,
    mut observer: Option<Arc<dyn Observer>>,
) {
    while let Some(command) = command_rx.recv().await {
        match command {
            DispatchCommand::Notify(notification) => {
                if let Some(observer) = &observer {
                    notification.deliver(observer.as_ref());
                }
            }
            DispatchCommand::SetObserver(replacement) => observer = Some(replacement),
            DispatchCommand::ClearObserver => observer = None,
            DispatchCommand::Shutdown => break,
        }
    }

    debug!("Dispatcher terminated");
}

// ============================================================================
// Tests
// ============================================================================
