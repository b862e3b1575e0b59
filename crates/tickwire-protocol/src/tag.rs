//! Fast-path tag extraction.

use crate::wire::WireReader;
use crate::{MessageType, ProtocolError};

/// Reads the message type of an encoded message without decoding it.
///
/// Parses the array header and the first integer, whatever their
/// encodings. Tags `0..=127` are a single positive-fixint byte, but
/// `128..=255` are `0xcc nn`, and a long message may use an `array16`
/// header, so no fixed byte offset is assumed.
///
/// # Errors
/// [`ProtocolError::MalformedFrame`] if the frame is not an array, is
/// empty, or does not start with an integer in `0..=255`.
pub fn extract_tag(frame: &[u8]) -> Result<MessageType, ProtocolError> {
    let mut reader = WireReader::new(frame, 1);
    let len = reader.read_array_len()?;
    if len == 0 {
        return Err(ProtocolError::malformed("empty message array has no tag"));
    }
    let raw = reader.read_int::<i64>()?;
    MessageType::new(raw).map_err(|_| ProtocolError::malformed(format!("tag {raw} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_small_tag() {
        assert_eq!(extract_tag(&[0x92, 0x07, 0xc0]).unwrap().get(), 7);
    }

    #[test]
    fn test_extract_tag_above_127() {
        // 0xcc prefix for uint8.
        assert_eq!(extract_tag(&[0x91, 0xcc, 0xc8]).unwrap().get(), 200);
        assert_eq!(extract_tag(&[0x91, 0xcc, 0xff]).unwrap().get(), 255);
    }

    #[test]
    fn test_extract_tag_with_array16_header() {
        let mut frame = vec![0xdc, 0x00, 0x10, 0x05];
        frame.extend(std::iter::repeat_n(0xc0, 15));
        assert_eq!(extract_tag(&frame).unwrap().get(), 5);
    }

    #[test]
    fn test_extract_tag_rejects_garbage() {
        assert!(extract_tag(&[]).is_err());
        assert!(extract_tag(&[0xc0]).is_err()); // nil, not an array
        assert!(extract_tag(&[0x90]).is_err()); // empty array
        assert!(extract_tag(&[0x91, 0xa1, b'x']).is_err()); // string tag
        assert!(extract_tag(&[0x91, 0xcd, 0x01, 0x00]).is_err()); // 256
        assert!(extract_tag(&[0x91, 0xff]).is_err()); // -1
    }
}
