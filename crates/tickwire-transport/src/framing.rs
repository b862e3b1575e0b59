//! Length-prefixed framing for byte streams.
//!
//! Every frame on a stream transport is:
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   payload          |
//! | u32 little-endian |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The length does not include the 4 prefix bytes. A length of 0 is a
//! valid (empty) frame.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Frame, TransportError};

/// Configuration for the framing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum allowed payload size in bytes. Default: 1 MiB.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1_048_576,
        }
    }
}

/// Reads one length-prefixed frame.
///
/// Waits until the whole frame is available. EOF at any point maps to
/// [`TransportError::ConnectionClosed`].
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Frame, TransportError> {
    read_frame_into(reader, &mut BytesMut::new(), config).await
}

/// Like [`read_frame`], reading the payload into `buf`.
///
/// The frame is split off `buf` and frozen, so no copy is made. Once the
/// previous frame has been dropped, `buf` reuses its allocation for the
/// next one.
///
/// Any error leaves the stream at an unknown offset; the caller should
/// treat the stream as dead.
pub async fn read_frame_into<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
    config: &FrameConfig,
) -> Result<Frame, TransportError> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(map_read_error)?;

    let payload_len = u32::from_le_bytes(len_buf);
    if payload_len > config.max_payload_size {
        return Err(TransportError::PayloadTooLarge {
            size: payload_len as usize,
            max: config.max_payload_size,
        });
    }

    buf.clear();
    buf.resize(payload_len as usize, 0);
    if payload_len > 0 {
        reader
            .read_exact(&mut buf[..])
            .await
            .map_err(map_read_error)?;
    }

    Ok(Frame::from(buf.split().freeze()))
}

/// Writes one length-prefixed frame and flushes.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= config.max_payload_size)
        .ok_or(TransportError::PayloadTooLarge {
            size: payload.len(),
            max: config.max_payload_size,
        })?;

    writer
        .write_all(&len.to_le_bytes())
        .await
        .map_err(TransportError::SendFailed)?;
    if !payload.is_empty() {
        writer
            .write_all(payload)
            .await
            .map_err(TransportError::SendFailed)?;
    }
    writer.flush().await.map_err(TransportError::SendFailed)?;

    Ok(())
}

fn map_read_error(e: std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::ConnectionClosed("peer closed the stream".into())
    } else {
        TransportError::ReceiveFailed(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_single_frame_roundtrip() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig::default();

        write_frame(&mut client, b"hello world", &config).await.unwrap();
        let received = read_frame(&mut server, &config).await.unwrap();
        assert_eq!(received.as_bytes(), b"hello world");
    }

    #[tokio::test]
    async fn test_back_to_back_frames_stay_separate() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig::default();

        write_frame(&mut client, b"aaa", &config).await.unwrap();
        write_frame(&mut client, b"bbb", &config).await.unwrap();

        let first = read_frame(&mut server, &config).await.unwrap();
        let second = read_frame(&mut server, &config).await.unwrap();
        assert_eq!(first.as_bytes(), b"aaa");
        assert_eq!(second.as_bytes(), b"bbb");
    }

    #[tokio::test]
    async fn test_partial_reads_reassemble() {
        // A tiny pipe buffer forces the frame through in pieces.
        let (mut client, mut server) = duplex(8);
        let config = FrameConfig::default();
        let payload = b"this frame is larger than the pipe buffer";

        let writer = tokio::spawn(async move {
            write_frame(&mut client, payload, &config).await.unwrap();
        });

        let received = read_frame(&mut server, &config).await.unwrap();
        writer.await.unwrap();
        assert_eq!(received.as_bytes(), payload);
    }

    #[tokio::test]
    async fn test_oversized_length_rejected_on_read() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };

        client.write_all(&1024u32.to_le_bytes()).await.unwrap();
        client.flush().await.unwrap();

        let result = read_frame(&mut server, &config).await;
        assert!(matches!(
            result,
            Err(TransportError::PayloadTooLarge { size: 1024, max: 16 })
        ));
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected_on_write() {
        let (mut client, _server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };

        let result = write_frame(&mut client, &[0u8; 64], &config).await;
        assert!(matches!(result, Err(TransportError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_zero_length_frame() {
        let (mut client, mut server) = duplex(64);
        let config = FrameConfig::default();

        write_frame(&mut client, &[], &config).await.unwrap();
        let received = read_frame(&mut server, &config).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_connection_closed() {
        let (mut client, mut server) = duplex(64);
        let config = FrameConfig::default();

        // Announce 10 bytes, deliver 3, hang up.
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let result = read_frame(&mut server, &config).await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_read_buffer_is_reused() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig::default();
        let mut buf = BytesMut::with_capacity(256);

        write_frame(&mut client, b"first", &config).await.unwrap();
        write_frame(&mut client, b"second", &config).await.unwrap();

        let first = read_frame_into(&mut server, &mut buf, &config).await.unwrap();
        assert_eq!(first.as_bytes(), b"first");
        assert!(buf.is_empty());
        drop(first);

        let second = read_frame_into(&mut server, &mut buf, &config).await.unwrap();
        assert_eq!(second.as_bytes(), b"second");
    }

    #[tokio::test]
    async fn test_length_prefix_is_little_endian() {
        let (mut client, mut server) = duplex(64);
        let config = FrameConfig::default();

        client.write_all(&[5, 0, 0, 0]).await.unwrap();
        client.write_all(b"hello").await.unwrap();

        let received = read_frame(&mut server, &config).await.unwrap();
        assert_eq!(received.as_bytes(), b"hello");
    }
}
