//! The tick-driven dispatcher.
//!
//! The game calls [`Dispatcher::tick`] once per frame of its own loop.
//! Each tick:
//!
//! 1. starts the receive loop the first time the connection is seen up,
//! 2. pops at most `max_frames_per_tick` frames from the hand-off queue,
//! 3. reads each frame's tag without decoding the body,
//! 4. hands `(tag, frame)` to the [`MessageHandler`].
//!
//! `tick` never waits. An empty queue makes it a no-op, and a frame
//! with an unreadable tag is dropped with a warning while the frames
//! behind it are delivered normally.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use tickwire_protocol::{Frame, MessageType, extract_tag};
use tickwire_transport::Connection;

use crate::config::{DispatchConfig, DisconnectPolicy};
use crate::queue::{self, FrameReceiver, FrameSender};
use crate::receive::{ReceiveExit, ReceiveLoop};
use crate::DispatchError;

/// Receives every delivered frame, on the dispatching thread, one at a
/// time, in arrival order.
pub trait MessageHandler {
    fn on_message(&mut self, message_type: MessageType, frame: Frame);
}

impl<F> MessageHandler for F
where
    F: FnMut(MessageType, Frame),
{
    fn on_message(&mut self, message_type: MessageType, frame: Frame) {
        self(message_type, frame)
    }
}

/// What one call to [`Dispatcher::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Whether the connection reported connected at the start of the tick.
    pub connected: bool,
    /// Frames handed to the handler.
    pub delivered: usize,
    /// Frames dropped because their tag could not be read.
    pub rejected: usize,
}

/// Running totals across all ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
    pub ticks: u64,
    pub delivered: u64,
    pub rejected: u64,
}

/// Moves frames from a connection to a handler, a few per tick.
pub struct Dispatcher<C: Connection, H: MessageHandler> {
    connection: Arc<C>,
    handler: H,
    config: DispatchConfig,
    runtime: Handle,
    inbox: FrameReceiver,
    /// Producer end, waiting to be handed to the receive loop.
    outbox: Option<FrameSender>,
    /// Set once, never reset: one receive loop per dispatcher.
    receive_loop: Option<ReceiveLoop>,
    stats: DispatchStats,
}

impl<C: Connection, H: MessageHandler> Dispatcher<C, H> {
    /// Creates a dispatcher that will spawn its receive loop on `runtime`.
    pub fn new(connection: Arc<C>, handler: H, config: DispatchConfig, runtime: Handle) -> Self {
        let (outbox, inbox) = queue::hand_off();
        let config = config.validated();
        debug!(
            id = %connection.id(),
            max_frames_per_tick = config.max_frames_per_tick,
            policy = ?config.disconnect_policy,
            "dispatcher created"
        );
        Self {
            connection,
            handler,
            config,
            runtime,
            inbox,
            outbox: Some(outbox),
            receive_loop: None,
            stats: DispatchStats::default(),
        }
    }

    /// Like [`new`](Self::new), using the runtime of the calling context.
    ///
    /// # Errors
    /// [`DispatchError::NoRuntime`] outside a Tokio runtime.
    pub fn on_current_runtime(
        connection: Arc<C>,
        handler: H,
        config: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        let runtime = Handle::try_current()?;
        Ok(Self::new(connection, handler, config, runtime))
    }

    /// Runs one dispatch step. Never blocks.
    pub fn tick(&mut self) -> TickSummary {
        self.stats.ticks += 1;
        let connected = self.connection.is_connected();
        let mut summary = TickSummary {
            tick: self.stats.ticks,
            connected,
            ..TickSummary::default()
        };

        if connected && self.receive_loop.is_none() {
            if let Err(e) = self.start_receive_loop() {
                warn!(error = %e, "could not start receive loop");
            }
        }

        if !connected && self.config.disconnect_policy == DisconnectPolicy::Hold {
            return summary;
        }

        for _ in 0..self.config.max_frames_per_tick {
            let Some(frame) = self.inbox.try_pop() else {
                break;
            };
            match extract_tag(&frame) {
                Ok(message_type) => {
                    trace!(tick = summary.tick, %message_type, bytes = frame.len(), "dispatching");
                    self.handler.on_message(message_type, frame);
                    summary.delivered += 1;
                }
                Err(e) => {
                    warn!(tick = summary.tick, error = %e, ?frame, "dropping frame with unreadable tag");
                    summary.rejected += 1;
                }
            }
        }

        self.stats.delivered += summary.delivered as u64;
        self.stats.rejected += summary.rejected as u64;
        summary
    }

    /// Starts the receive loop now instead of waiting for the next tick.
    ///
    /// # Errors
    /// - [`DispatchError::AlreadyStarted`] if a loop was ever started,
    ///   even one that has since finished
    /// - [`DispatchError::NotConnected`] if the connection is down
    pub fn start_receive_loop(&mut self) -> Result<(), DispatchError> {
        if self.receive_loop.is_some() {
            return Err(DispatchError::AlreadyStarted);
        }
        if !self.connection.is_connected() {
            return Err(DispatchError::NotConnected);
        }
        let outbox = self.outbox.take().ok_or(DispatchError::AlreadyStarted)?;
        self.receive_loop = Some(ReceiveLoop::spawn(
            &self.runtime,
            Arc::clone(&self.connection),
            outbox,
            self.config.receive_pause(),
        ));
        Ok(())
    }

    /// Whether a receive loop exists and is still running.
    pub fn is_receiving(&self) -> bool {
        self.receive_loop
            .as_ref()
            .is_some_and(|receive_loop| !receive_loop.is_finished())
    }

    /// Whether a receive loop was ever started.
    pub fn receive_loop_started(&self) -> bool {
        self.receive_loop.is_some()
    }

    /// Frames waiting in the hand-off queue.
    pub fn backlog(&self) -> usize {
        self.inbox.len()
    }

    /// Asks the receive loop to stop without waiting for it.
    pub fn stop_receive_loop(&self) {
        if let Some(receive_loop) = &self.receive_loop {
            receive_loop.stop();
        }
    }

    /// Stops the receive loop and waits for it to end.
    ///
    /// Returns `None` if no loop was ever started. Queued frames are kept
    /// and can still be delivered by [`tick`](Self::tick). The loop is not
    /// restartable afterwards.
    pub async fn shutdown(&mut self) -> Option<ReceiveExit> {
        let receive_loop = self.receive_loop.as_mut()?;
        let exit = receive_loop.join().await;
        debug!(?exit, "dispatcher shut down receive loop");
        Some(exit)
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
