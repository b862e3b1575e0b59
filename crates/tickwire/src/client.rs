//! `GameClient` builder and run loop.
//!
//! This is the entry point for a game client. It ties the layers together:
//! transport → receive loop → dispatcher → handler, with the codec
//! registry on the send path.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use tickwire_dispatch::{
    DisconnectPolicy, Dispatcher, MessageHandler, TickClock, TickSummary,
};
use tickwire_protocol::{CodecRegistry, Frame};
use tickwire_transport::{Connection, Transport};

use crate::config::ClientConfig;
use crate::connection::{ClientConnection, ConfiguredTransport};
use crate::TickwireError;

/// Why [`GameClient::run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The stop future completed.
    Stopped,
    /// The connection is gone and nothing more can be delivered.
    Disconnected,
}

/// Totals for one [`GameClient::run_until`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub exit: RunExit,
    pub ticks: u64,
    pub delivered: u64,
    /// Frames still queued when the run ended with
    /// [`RunExit::Disconnected`]. Non-zero only under
    /// [`DisconnectPolicy::Hold`].
    pub undelivered: usize,
}

/// Builder for a [`GameClient`].
///
/// # Example
///
/// ```rust,no_run
/// use tickwire::prelude::*;
///
/// # async fn demo() -> Result<(), TickwireError> {
/// let mut client = GameClientBuilder::new()
///     .address("127.0.0.1:7777")
///     .connect(|tag: MessageType, frame: Frame| {
///         println!("{tag}: {} bytes", frame.len());
///     })
///     .await?;
///
/// client.run_until(tokio::signal::ctrl_c()).await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct GameClientBuilder {
    config: ClientConfig,
    registry: Option<Arc<CodecRegistry>>,
}

impl GameClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the server address.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Uses `registry` instead of building a standard one. Pass the same
    /// `Arc` to a [`Router`](tickwire_dispatch::Router) so both sides
    /// agree on formats.
    pub fn registry(mut self, registry: Arc<CodecRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Connects with the transport named in the config.
    ///
    /// # Errors
    /// [`TickwireError::Transport`] if the connection fails. Nothing is
    /// retried.
    pub async fn connect<H: MessageHandler>(
        self,
        handler: H,
    ) -> Result<GameClient<ClientConnection, H>, TickwireError> {
        let transport =
            ConfiguredTransport::new(self.config.transport, self.config.frame_config());
        self.connect_with(&transport, handler).await
    }

    /// Connects with a caller-supplied transport.
    pub async fn connect_with<T: Transport, H: MessageHandler>(
        self,
        transport: &T,
        handler: H,
    ) -> Result<GameClient<T::Connection, H>, TickwireError> {
        let config = self.config.validated();
        let registry = match self.registry {
            Some(registry) => registry,
            None => Arc::new(
                CodecRegistry::builder()
                    .standard()
                    .config(config.codec_config())
                    .build()?,
            ),
        };

        info!(address = %config.address, transport = ?config.transport, "connecting");
        let connection = transport.connect(&config.address).await?;
        info!(id = %connection.id(), "connected");

        let dispatcher =
            Dispatcher::on_current_runtime(Arc::new(connection), handler, config.dispatch.clone())?;

        Ok(GameClient {
            dispatcher,
            registry,
            config,
        })
    }
}

/// A connected game client.
///
/// Call [`tick`](Self::tick) from the game's frame loop, or let
/// [`run_until`](Self::run_until) drive it at the configured rate.
pub struct GameClient<C: Connection, H: MessageHandler> {
    dispatcher: Dispatcher<C, H>,
    registry: Arc<CodecRegistry>,
    config: ClientConfig,
}

impl<C: Connection, H: MessageHandler> GameClient<C, H> {
    /// Runs one dispatch step.
    pub fn tick(&mut self) -> TickSummary {
        self.dispatcher.tick()
    }

    /// Encodes `value` and sends it.
    ///
    /// # Errors
    /// [`TickwireError::Protocol`] if `value` can't be encoded (nothing is
    /// sent), or [`TickwireError::Transport`] if the write fails.
    pub async fn send<T: 'static>(&self, value: &T) -> Result<(), TickwireError> {
        let frame = self.registry.encode(value)?;
        self.send_frame(&frame).await
    }

    /// Sends already-encoded bytes.
    pub async fn send_frame(&self, frame: &Frame) -> Result<(), TickwireError> {
        self.dispatcher.connection().write_frame(frame).await?;
        Ok(())
    }

    /// Ticks at the configured rate until `stop` completes or the
    /// connection is gone for good.
    ///
    /// "Gone for good" means the connection reports disconnected, the
    /// receive loop has ended, and the queue holds nothing that can
    /// still be delivered. Under [`DisconnectPolicy::Hold`] queued frames
    /// cannot be, so they are counted in [`RunSummary::undelivered`] and
    /// logged at `warn`.
    pub async fn run_until<F: Future>(&mut self, stop: F) -> RunSummary {
        let mut clock = TickClock::new(self.config.clock_config());
        let mut ticks = 0;
        let mut delivered = 0;
        tokio::pin!(stop);

        let exit = loop {
            tokio::select! {
                _ = &mut stop => break RunExit::Stopped,
                _ = clock.wait_for_tick() => {
                    let summary = self.dispatcher.tick();
                    clock.record_tick_end();
                    ticks += 1;
                    delivered += summary.delivered as u64;
                    if self.is_finished() {
                        break RunExit::Disconnected;
                    }
                }
            }
        };

        let undelivered = match exit {
            RunExit::Disconnected => self.dispatcher.backlog(),
            RunExit::Stopped => 0,
        };
        if undelivered > 0 {
            warn!(
                undelivered,
                policy = ?self.dispatcher.config().disconnect_policy,
                "connection lost with frames still queued; they will not be delivered"
            );
        }

        debug!(?exit, ticks, delivered, undelivered, "run loop ended");
        RunSummary {
            exit,
            ticks,
            delivered,
            undelivered,
        }
    }

    fn is_finished(&self) -> bool {
        let d = &self.dispatcher;
        if d.connection().is_connected() || d.is_receiving() || !d.receive_loop_started() {
            return false;
        }
        d.backlog() == 0 || d.config().disconnect_policy == DisconnectPolicy::Hold
    }

    /// Closes the connection and stops the receive loop.
    ///
    /// Frames already queued stay queued.
    pub async fn disconnect(&mut self) -> Result<(), TickwireError> {
        let id = self.dispatcher.connection().id();
        self.dispatcher.connection().close().await?;
        let exit = self.dispatcher.shutdown().await;
        info!(%id, ?exit, "disconnected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.dispatcher.connection().is_connected()
    }

    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher<C, H> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<C, H> {
        &mut self.dispatcher
    }

    pub fn handler(&self) -> &H {
        self.dispatcher.handler()
    }

    pub fn handler_mut(&mut self) -> &mut H {
        self.dispatcher.handler_mut()
    }
}
