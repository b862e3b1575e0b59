//! Transport abstraction layer for Tickwire.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the socket a game client talks to its server through, plus two client
//! implementations.
//!
//! A [`Connection`] moves whole [`Frame`]s: it never hands out half a
//! message. Stream transports (TCP) get there with a length prefix (see
//! [`framing`]); message transports (WebSocket) get it for free.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket client via `tokio-tungstenite`

mod error;
mod frame;
pub mod framing;
mod tcp;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use frame::Frame;
pub use framing::FrameConfig;
pub use tcp::{TcpConnection, TcpTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Dials servers and produces connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Connects to `addr`.
    ///
    /// Failure is reported as [`TransportError::Connect`] and is never
    /// retried here; reconnect policy belongs to the caller.
    fn connect(
        &self,
        addr: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single live connection that reads and writes whole frames.
///
/// Reads and writes may run concurrently from different tasks: a receive
/// loop can sit in [`read_frame`](Self::read_frame) while the game thread
/// calls [`write_frame`](Self::write_frame).
pub trait Connection: Send + Sync + 'static {
    /// Whether the connection is still up.
    ///
    /// Turns `false` after [`close`](Self::close), or once a read or write
    /// observes that the peer has gone.
    fn is_connected(&self) -> bool;

    /// Waits for the next complete frame from the peer.
    fn read_frame(&self) -> impl Future<Output = Result<Frame, TransportError>> + Send;

    /// Sends one frame to the peer.
    fn write_frame(
        &self,
        frame: &Frame,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the connection. Idempotent.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
