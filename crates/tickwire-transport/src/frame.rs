//! The [`Frame`] type: one complete serialized message.

use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

/// One fully-serialized message as raw bytes.
///
/// Frames are immutable and cheap to clone (the payload is a
/// reference-counted [`Bytes`]). A frame is always handed around whole;
/// nothing in Tickwire ever consumes part of one.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame(Bytes);

impl Frame {
    /// Creates a frame from anything that can become shared bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Returns the frame contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// A shared handle to the payload. No copy.
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// Number of bytes in the frame.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a zero-length frame.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Frame {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Frame {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self {
        frame.0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Shows the length and the first few bytes in hex; full payloads in
/// logs are noise.
impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 8;
        write!(f, "Frame({} bytes: ", self.0.len())?;
        for byte in self.0.iter().take(PREVIEW) {
            write!(f, "{byte:02x}")?;
        }
        if self.0.len() > PREVIEW {
            write!(f, "..")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_from_vec_keeps_bytes() {
        let frame = Frame::from(vec![0x91, 0x07]);
        assert_eq!(frame.as_bytes(), &[0x91, 0x07]);
        assert_eq!(frame.len(), 2);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_frame_clone_shares_storage() {
        let frame = Frame::from(vec![1, 2, 3]);
        let copy = frame.clone();
        assert_eq!(frame, copy);
        assert_eq!(frame.as_bytes().as_ptr(), copy.as_bytes().as_ptr());
        assert_eq!(frame.to_bytes().as_ptr(), frame.as_bytes().as_ptr());
    }

    #[test]
    fn test_frame_from_static_bytes() {
        let frame = Frame::new(Bytes::from_static(b"\x91\x05"));
        assert_eq!(Bytes::from(frame), Bytes::from_static(b"\x91\x05"));
    }

    #[test]
    fn test_frame_debug_truncates_long_payloads() {
        let frame = Frame::from(vec![0xab; 20]);
        let debug = format!("{frame:?}");
        assert_eq!(debug, "Frame(20 bytes: abababababababab..)");
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::from(Vec::new());
        assert!(frame.is_empty());
        assert_eq!(format!("{frame:?}"), "Frame(0 bytes: )");
    }
}
