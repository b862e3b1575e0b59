//! A transport chosen at runtime from [`TransportKind`].

use tickwire_transport::{
    Connection, ConnectionId, Frame, FrameConfig, TcpConnection, TcpTransport, Transport,
    TransportError,
};
#[cfg(feature = "websocket")]
use tickwire_transport::{WebSocketConnection, WebSocketTransport};

use crate::config::TransportKind;

/// Dials whichever transport the config names.
#[derive(Debug, Clone, Copy)]
pub struct ConfiguredTransport {
    kind: TransportKind,
    frame: FrameConfig,
}

impl ConfiguredTransport {
    pub fn new(kind: TransportKind, frame: FrameConfig) -> Self {
        Self { kind, frame }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }
}

impl Transport for ConfiguredTransport {
    type Connection = ClientConnection;

    async fn connect(&self, addr: &str) -> Result<ClientConnection, TransportError> {
        match self.kind {
            TransportKind::Tcp => TcpTransport::new(self.frame)
                .connect(addr)
                .await
                .map(ClientConnection::Tcp),
            #[cfg(feature = "websocket")]
            TransportKind::WebSocket => WebSocketTransport
                .connect(addr)
                .await
                .map(ClientConnection::WebSocket),
        }
    }
}

/// A connection from [`ConfiguredTransport`].
pub enum ClientConnection {
    Tcp(TcpConnection),
    #[cfg(feature = "websocket")]
    WebSocket(WebSocketConnection),
}

impl Connection for ClientConnection {
    fn is_connected(&self) -> bool {
        match self {
            Self::Tcp(c) => c.is_connected(),
            #[cfg(feature = "websocket")]
            Self::WebSocket(c) => c.is_connected(),
        }
    }

    async fn read_frame(&self) -> Result<Frame, TransportError> {
        match self {
            Self::Tcp(c) => c.read_frame().await,
            #[cfg(feature = "websocket")]
            Self::WebSocket(c) => c.read_frame().await,
        }
    }

    async fn write_frame(&self, frame: &Frame) -> Result<(), TransportError> {
        match self {
            Self::Tcp(c) => c.write_frame(frame).await,
            #[cfg(feature = "websocket")]
            Self::WebSocket(c) => c.write_frame(frame).await,
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self {
            Self::Tcp(c) => c.close().await,
            #[cfg(feature = "websocket")]
            Self::WebSocket(c) => c.close().await,
        }
    }

    fn id(&self) -> ConnectionId {
        match self {
            Self::Tcp(c) => c.id(),
            #[cfg(feature = "websocket")]
            Self::WebSocket(c) => c.id(),
        }
    }
}
