//! WebSocket client transport using `tokio-tungstenite`.
//!
//! Each binary WebSocket message is one [`Frame`]; the WebSocket layer
//! already delimits messages, so no length prefix is added.

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, Frame, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A [`Transport`] that dials WebSocket servers.
///
/// `addr` may be a full `ws://` / `wss://` URL or a bare `host:port`,
/// which is treated as `ws://host:port`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn connect(&self, addr: &str) -> Result<WebSocketConnection, TransportError> {
        let url = if addr.starts_with("ws://") || addr.starts_with("wss://") {
            addr.to_string()
        } else {
            format!("ws://{addr}")
        };

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect {
                addr: url.clone(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e),
            })?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %url, "WebSocket connection established");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            connected: AtomicBool::new(true),
        })
    }
}

/// A single WebSocket connection.
///
/// The stream is split so a pending read never holds up a write.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    connected: AtomicBool,
}

impl WebSocketConnection {
    fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::debug!(id = %self.id, "WebSocket connection lost");
        }
    }
}

impl Connection for WebSocketConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn read_frame(&self) -> Result<Frame, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Frame::from(data));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Frame::from(text.as_bytes()));
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.mark_disconnected();
                    return Err(TransportError::ConnectionClosed(
                        "server closed the WebSocket".into(),
                    ));
                }
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    self.mark_disconnected();
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn write_frame(&self, frame: &Frame) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let msg = Message::Binary(frame.to_bytes());
        let result = self.sink.lock().await.send(msg).await;
        result.map_err(|e| {
            self.mark_disconnected();
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(id = %self.id, "closing WebSocket connection");
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
