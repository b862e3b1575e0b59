/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server could not be reached.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        /// The address that was dialed.
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection was closed by the peer or locally.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The connection is not (or no longer) connected.
    #[error("not connected")]
    NotConnected,

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// A frame exceeded the configured size limit.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: usize,
        /// The configured maximum.
        max: u32,
    },
}

impl TransportError {
    /// Returns `true` if the error means the connection is gone for good.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed(_) | Self::NotConnected | Self::ReceiveFailed(_)
        )
    }
}
