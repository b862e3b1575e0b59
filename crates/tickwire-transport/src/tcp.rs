//! TCP client transport with length-prefixed frames.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::framing::{self, FrameConfig};
use crate::{Connection, ConnectionId, Frame, Transport, TransportError};

/// A [`Transport`] that dials TCP servers.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: FrameConfig,
}

impl TcpTransport {
    /// Creates a transport whose connections use `config` for framing.
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<TcpConnection, TransportError> {
        let stream = TcpStream::connect(addr).await.map_err(|source| {
            TransportError::Connect {
                addr: addr.to_string(),
                source,
            }
        })?;
        TcpConnection::from_stream(stream, self.config)
    }
}

/// Initial size of the per-connection payload buffer.
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// The read side: the stream plus the buffer frames are split off.
struct ReadHalf {
    stream: BufReader<OwnedReadHalf>,
    buf: BytesMut,
}

/// A connected TCP stream split into independently locked halves.
///
/// The read half belongs to whoever is receiving (in practice a single
/// receive loop); the write half is shared by senders.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<ReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    connected: AtomicBool,
    config: FrameConfig,
}

impl TcpConnection {
    /// Wraps an already-connected stream. Sets `TCP_NODELAY`.
    pub fn from_stream(
        stream: TcpStream,
        config: FrameConfig,
    ) -> Result<Self, TransportError> {
        let peer = stream.peer_addr().map_err(|source| TransportError::Connect {
            addr: "<unknown>".into(),
            source,
        })?;
        stream.set_nodelay(true).map_err(|source| TransportError::Connect {
            addr: peer.to_string(),
            source,
        })?;

        let (reader, writer) = stream.into_split();
        let id = ConnectionId::next();
        tracing::debug!(%id, %peer, "TCP connection established");

        Ok(Self {
            id,
            peer,
            reader: Mutex::new(ReadHalf {
                stream: BufReader::new(reader),
                buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            }),
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
            config,
        })
    }

    /// The remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn mark_disconnected(&self, reason: &TransportError) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::debug!(id = %self.id, peer = %self.peer, error = %reason, "TCP connection lost");
        }
    }
}

impl Connection for TcpConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn read_frame(&self) -> Result<Frame, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let mut reader = self.reader.lock().await;
        let ReadHalf { stream, buf } = &mut *reader;
        match framing::read_frame_into(stream, buf, &self.config).await {
            Ok(frame) => {
                tracing::trace!(id = %self.id, len = frame.len(), "frame read");
                Ok(frame)
            }
            Err(e) => {
                // Whatever went wrong, the stream is no longer at a frame
                // boundary and cannot be read again.
                self.mark_disconnected(&e);
                Err(e)
            }
        }
    }

    async fn write_frame(&self, frame: &Frame) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let mut writer = self.writer.lock().await;
        let result = framing::write_frame(&mut *writer, frame, &self.config).await;
        if let Err(e @ TransportError::SendFailed(_)) = &result {
            self.mark_disconnected(e);
        }
        result
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(id = %self.id, peer = %self.peer, "closing TCP connection");
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
