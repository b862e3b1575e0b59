//! # Tickwire
//!
//! Tick-driven networking core for game clients.
//!
//! A background task reads whole frames off the connection; the game's
//! own loop calls [`GameClient::tick`] once per frame to hand a bounded
//! number of them to a handler, on the game thread. Messages are
//! MessagePack arrays tagged with a [`MessageType`](tickwire_protocol::MessageType)
//! in `0..=255`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tickwire::prelude::*;
//!
//! # async fn demo() -> Result<(), TickwireError> {
//! tickwire::logging::init("info")?;
//!
//! let registry = Arc::new(CodecRegistry::standard()?);
//! let router = Router::new(Arc::clone(&registry))
//!     .on::<Envelope>(1u8, |env| println!("got {}", env.message_type()));
//!
//! let mut client = GameClientBuilder::new()
//!     .address("127.0.0.1:7777")
//!     .registry(registry)
//!     .connect(router)
//!     .await?;
//!
//! client.send(&Envelope::try_new(2)?).await?;
//! client.run_until(tokio::signal::ctrl_c()).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - [`tickwire_transport`]: connections and frames
//! - [`tickwire_protocol`]: message types, wire format, codec registry
//! - [`tickwire_dispatch`]: receive loop, dispatcher, router, tick clock

mod client;
mod config;
mod connection;
mod error;
pub mod logging;

pub use client::{GameClient, GameClientBuilder, RunExit, RunSummary};
pub use config::{ClientConfig, TransportKind};
pub use connection::{ClientConnection, ConfiguredTransport};
pub use error::TickwireError;

pub use tickwire_dispatch;
pub use tickwire_protocol;
pub use tickwire_transport;

/// Everything a typical client needs.
pub mod prelude {
    pub use crate::{
        ClientConfig, GameClient, GameClientBuilder, RunExit, TickwireError, TransportKind,
    };
    pub use tickwire_dispatch::{
        DisconnectPolicy, DispatchConfig, MessageHandler, Router, TickClock, TickSummary,
    };
    pub use tickwire_protocol::{
        CodecRegistry, Envelope, FieldReader, FieldWriter, FormatterTable, Frame, Message,
        MessageType, ProtocolError,
    };
    pub use tickwire_transport::{Connection, Transport};
}
