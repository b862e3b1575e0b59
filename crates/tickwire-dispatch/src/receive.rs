//! The background receive loop.
//!
//! One Tokio task per connection. It waits for frames and pushes them
//! onto the hand-off queue, nothing more: no decoding, no routing, no
//! reconnecting. When the connection goes away the task ends and stays
//! ended.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use tickwire_transport::{Connection, ConnectionId};

use crate::queue::FrameSender;

/// Why a receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveExit {
    /// The connection reported closed (or was already closed).
    Disconnected,
    /// A read failed for some other reason.
    ReadFailed,
    /// The dispatcher dropped the consuming end of the queue.
    QueueClosed,
    /// [`ReceiveLoop::stop`] was called, or the handle was dropped.
    Stopped,
}

/// Handle to a running receive loop.
///
/// Dropping the handle stops the loop.
#[derive(Debug)]
pub struct ReceiveLoop {
    connection_id: ConnectionId,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<ReceiveExit>>,
    exit: Option<ReceiveExit>,
}

impl ReceiveLoop {
    /// Spawns the loop on `runtime`.
    ///
    /// `pause`, if set, is slept between successful reads.
    pub fn spawn<C: Connection>(
        runtime: &Handle,
        connection: Arc<C>,
        queue: FrameSender,
        pause: Option<Duration>,
    ) -> Self {
        let connection_id = connection.id();
        let (stop, stop_rx) = watch::channel(false);
        let task = runtime.spawn(run(connection, queue, pause, stop_rx));
        debug!(id = %connection_id, ?pause, "receive loop started");
        Self {
            connection_id,
            stop,
            task: Some(task),
            exit: None,
        }
    }

    /// Asks the loop to end. It notices at its next await point.
    pub fn stop(&self) {
        // An error only means the task is already gone.
        let _ = self.stop.send(true);
    }

    /// Whether the task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Stops the loop and waits for it to end. Calling it again returns
    /// the same exit reason.
    pub async fn join(&mut self) -> ReceiveExit {
        self.stop();
        if let Some(task) = self.task.take() {
            // A join error means the task was cancelled with its runtime.
            self.exit = Some(task.await.unwrap_or(ReceiveExit::Stopped));
        }
        self.exit.unwrap_or(ReceiveExit::Stopped)
    }
}

async fn run<C: Connection>(
    connection: Arc<C>,
    queue: FrameSender,
    pause: Option<Duration>,
    mut stop: watch::Receiver<bool>,
) -> ReceiveExit {
    let id = connection.id();

    let exit = loop {
        if *stop.borrow() {
            break ReceiveExit::Stopped;
        }
        if !connection.is_connected() {
            break ReceiveExit::Disconnected;
        }

        let result = tokio::select! {
            // A closed channel means the handle was dropped: stop too.
            _ = stop.changed() => break ReceiveExit::Stopped,
            result = connection.read_frame() => result,
        };

        let frame = match result {
            Ok(frame) => frame,
            Err(e) if e.is_disconnect() => {
                debug!(%id, error = %e, "connection ended");
                break ReceiveExit::Disconnected;
            }
            Err(e) => {
                warn!(%id, error = %e, "read failed");
                break ReceiveExit::ReadFailed;
            }
        };

        trace!(%id, bytes = frame.len(), "frame received");
        if queue.push(frame).is_err() {
            break ReceiveExit::QueueClosed;
        }

        if let Some(pause) = pause {
            tokio::select! {
                _ = stop.changed() => break ReceiveExit::Stopped,
                () = tokio::time::sleep(pause) => {}
            }
        }
    };

    debug!(%id, ?exit, "receive loop finished");
    exit
}
