//! Low-level MessagePack reading and writing.
//!
//! [`WireWriter`] appends MessagePack values to a buffer using `rmp`'s
//! encoders. [`WireReader`] decodes a borrowed buffer with `rmp`'s
//! decoders. It never copies strings or binary blobs (they come back as
//! slices of the frame), and it tracks nesting depth so a hostile frame
//! of `[[[[[[...]]]]]]` cannot recurse without bound.

use std::fmt;

use rmp::{Marker, decode, encode};

use tickwire_transport::Frame;

use crate::ProtocolError;

fn encode_error(e: impl fmt::Debug) -> ProtocolError {
    ProtocolError::Encode(format!("{e:?}"))
}

// ---------------------------------------------------------------------------
// WireWriter
// ---------------------------------------------------------------------------

/// Appends MessagePack values to an owned buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes an array header announcing `len` elements.
    pub fn write_array_len(&mut self, len: u32) -> Result<(), ProtocolError> {
        encode::write_array_len(&mut self.buf, len).map_err(encode_error)?;
        Ok(())
    }

    /// Writes `nil`.
    pub fn write_nil(&mut self) -> Result<(), ProtocolError> {
        encode::write_nil(&mut self.buf).map_err(encode_error)
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        encode::write_bool(&mut self.buf, value).map_err(encode_error)
    }

    /// Writes an unsigned integer in the narrowest encoding.
    ///
    /// Values below 128 take one byte; 128..=255 take two (`0xcc nn`).
    pub fn write_uint(&mut self, value: u64) -> Result<(), ProtocolError> {
        encode::write_uint(&mut self.buf, value).map_err(encode_error)?;
        Ok(())
    }

    /// Writes a signed integer in the narrowest encoding.
    pub fn write_sint(&mut self, value: i64) -> Result<(), ProtocolError> {
        encode::write_sint(&mut self.buf, value).map_err(encode_error)?;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), ProtocolError> {
        encode::write_f32(&mut self.buf, value).map_err(encode_error)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), ProtocolError> {
        encode::write_f64(&mut self.buf, value).map_err(encode_error)
    }

    pub fn write_str(&mut self, value: &str) -> Result<(), ProtocolError> {
        encode::write_str(&mut self.buf, value).map_err(encode_error)
    }

    pub fn write_bin(&mut self, value: &[u8]) -> Result<(), ProtocolError> {
        encode::write_bin(&mut self.buf, value).map_err(encode_error)
    }

    /// Direct access for encoders that write MessagePack themselves
    /// (the serde bridge).
    pub(crate) fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the writer, returning the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Consumes the writer, returning the encoded bytes as a [`Frame`].
    pub fn into_frame(self) -> Frame {
        Frame::from(self.buf)
    }
}

// ---------------------------------------------------------------------------
// WireReader
// ---------------------------------------------------------------------------

/// Reads MessagePack values from a borrowed buffer.
///
/// Decoding is done by `rmp::decode` over the unread tail; the reader
/// only tracks the cursor and the nesting depth.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader over `buf` that allows at most `max_depth` nested
    /// containers.
    pub fn new(buf: &'a [u8], max_depth: usize) -> Self {
        Self {
            buf,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unread tail of the buffer.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// `true` once every byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Current container nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Moves the cursor forward by `n` bytes consumed by an outside decoder.
    pub(crate) fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buf.len());
    }

    /// Enters one level of nesting.
    ///
    /// # Errors
    /// [`ProtocolError::DepthLimitExceeded`] when already at the limit.
    pub fn enter(&mut self) -> Result<(), ProtocolError> {
        if self.depth >= self.max_depth {
            return Err(ProtocolError::DepthLimitExceeded {
                max: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Leaves one level of nesting.
    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Runs an `rmp` decoder on the unread tail and moves the cursor past
    /// whatever it consumed. On error the cursor stays put.
    fn decode<T, E: fmt::Display>(
        &mut self,
        what: &str,
        read: impl FnOnce(&mut &'a [u8]) -> Result<T, E>,
    ) -> Result<T, ProtocolError> {
        let mut rest = self.remaining();
        let value = read(&mut rest)
            .map_err(|e| ProtocolError::malformed(format!("reading {what} at offset {}: {e}", self.pos)))?;
        self.pos = self.buf.len() - rest.len();
        Ok(value)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let rest = self.remaining();
        if n > rest.len() {
            return Err(ProtocolError::malformed(format!(
                "truncated: need {n} bytes at offset {}, have {}",
                self.pos,
                rest.len()
            )));
        }
        self.pos += n;
        Ok(&rest[..n])
    }

    /// Looks at the next marker without consuming it.
    pub fn peek_marker(&self) -> Result<Marker, ProtocolError> {
        self.buf
            .get(self.pos)
            .map(|byte| Marker::from_u8(*byte))
            .ok_or_else(|| ProtocolError::malformed("truncated: expected a value"))
    }

    /// Consumes and returns the next marker.
    pub fn read_marker(&mut self) -> Result<Marker, ProtocolError> {
        self.decode("marker", |rd| decode::read_marker(rd).map_err(|e| e.0))
    }

    /// Consumes a `nil` if one is next. Returns whether it did.
    pub fn try_read_nil(&mut self) -> Result<bool, ProtocolError> {
        if !matches!(self.peek_marker()?, Marker::Null) {
            return Ok(false);
        }
        self.decode("nil", decode::read_nil)?;
        Ok(true)
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        self.decode("bool", decode::read_bool)
    }

    /// Reads an integer of any width and converts it to `T`.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedFrame`] if the next value is not an
    /// integer or does not fit in `T`.
    pub fn read_int<T: TryFrom<i128>>(&mut self) -> Result<T, ProtocolError> {
        // i128 holds every MessagePack integer without loss.
        let value: i128 = self.decode("integer", decode::read_int)?;
        T::try_from(value).map_err(|_| {
            ProtocolError::malformed(format!(
                "integer {value} out of range for {}",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        self.decode("f32", decode::read_f32)
    }

    /// Reads a float. Accepts `f32` encodings as well, widening them.
    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        match self.peek_marker()? {
            Marker::F32 => self.read_f32().map(f64::from),
            _ => self.decode("f64", decode::read_f64),
        }
    }

    /// Reads a UTF-8 string, borrowed from the buffer.
    pub fn read_str(&mut self) -> Result<&'a str, ProtocolError> {
        let rest = self.remaining();
        let (value, tail) = decode::read_str_from_slice(rest).map_err(|e| {
            ProtocolError::malformed(format!("reading string at offset {}: {e}", self.pos))
        })?;
        self.pos = self.buf.len() - tail.len();
        Ok(value)
    }

    /// Reads a binary blob, borrowed from the buffer.
    pub fn read_bin(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.decode("binary length", decode::read_bin_len)?;
        self.take(len as usize)
    }

    /// Reads an array header and returns the element count.
    ///
    /// Does not touch the depth counter; callers that descend into the
    /// elements pair this with [`enter`](Self::enter).
    pub fn read_array_len(&mut self) -> Result<u32, ProtocolError> {
        self.decode("array header", decode::read_array_len)
    }

    /// Skips one complete value of any type, including nested containers.
    pub fn skip(&mut self) -> Result<(), ProtocolError> {
        let elements = match self.peek_marker()? {
            Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
                let len = self.decode("string length", decode::read_str_len)?;
                self.take(len as usize)?;
                return Ok(());
            }
            Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => {
                self.read_bin()?;
                return Ok(());
            }
            Marker::FixExt1
            | Marker::FixExt2
            | Marker::FixExt4
            | Marker::FixExt8
            | Marker::FixExt16
            | Marker::Ext8
            | Marker::Ext16
            | Marker::Ext32 => {
                let meta = self.decode("extension header", decode::read_ext_meta)?;
                self.take(meta.size as usize)?;
                return Ok(());
            }
            Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
                u64::from(self.read_array_len()?)
            }
            Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
                u64::from(self.decode("map header", decode::read_map_len)?) * 2
            }
            Marker::Reserved => return Err(ProtocolError::malformed("reserved marker 0xc1")),
            scalar => {
                self.read_marker()?;
                let width = match scalar {
                    Marker::U8 | Marker::I8 => 1,
                    Marker::U16 | Marker::I16 => 2,
                    Marker::U32 | Marker::I32 | Marker::F32 => 4,
                    Marker::U64 | Marker::I64 | Marker::F64 => 8,
                    _ => 0,
                };
                self.take(width)?;
                return Ok(());
            }
        };

        self.enter()?;
        for _ in 0..elements {
            self.skip()?;
        }
        self.leave();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8]) -> WireReader<'_> {
        WireReader::new(bytes, 8)
    }

    #[test]
    fn test_uint_width_depends_on_value() {
        let mut w = WireWriter::new();
        w.write_uint(127).unwrap();
        assert_eq!(w.into_bytes(), vec![0x7f]);

        let mut w = WireWriter::new();
        w.write_uint(128).unwrap();
        assert_eq!(w.into_bytes(), vec![0xcc, 0x80]);
    }

    #[test]
    fn test_read_int_accepts_any_width() {
        assert_eq!(reader(&[0x05]).read_int::<u8>().unwrap(), 5);
        assert_eq!(reader(&[0xcc, 0xff]).read_int::<u8>().unwrap(), 255);
        assert_eq!(reader(&[0xd0, 0x10]).read_int::<u8>().unwrap(), 16);
        assert_eq!(reader(&[0xff]).read_int::<i32>().unwrap(), -1);
        assert_eq!(
            reader(&[0xcd, 0x01, 0x00]).read_int::<u32>().unwrap(),
            256
        );
    }

    #[test]
    fn test_read_int_rejects_overflow() {
        let err = reader(&[0xcd, 0x01, 0x00]).read_int::<u8>().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));

        let err = reader(&[0xff]).read_int::<u64>().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[test]
    fn test_truncated_input_is_malformed() {
        // u16 marker with one byte of payload.
        let err = reader(&[0xcd, 0x01]).read_int::<u16>().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));

        // str8 announcing 4 bytes with 2 present.
        let err = reader(&[0xd9, 0x04, b'a', b'b']).read_str().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));

        let err = reader(&[]).read_bool().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[test]
    fn test_str_and_bin_borrow_from_buffer() {
        let mut w = WireWriter::new();
        w.write_str("hello").unwrap();
        w.write_bin(&[1, 2, 3]).unwrap();
        let bytes = w.into_bytes();

        let mut r = reader(&bytes);
        assert_eq!(r.read_str().unwrap(), "hello");
        assert_eq!(r.read_bin().unwrap(), &[1, 2, 3]);
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_skip_nested_containers() {
        let mut w = WireWriter::new();
        w.write_array_len(3).unwrap();
        w.write_str("a").unwrap();
        w.write_array_len(2).unwrap();
        w.write_f64(1.5).unwrap();
        w.write_nil().unwrap();
        w.write_bin(&[9; 300]).unwrap();
        w.write_uint(7).unwrap();
        let bytes = w.into_bytes();

        let mut r = reader(&bytes);
        r.skip().unwrap();
        assert_eq!(r.read_int::<u8>().unwrap(), 7);
        assert_eq!(r.depth(), 0);
    }

    #[test]
    fn test_skip_respects_depth_limit() {
        // Ten nested single-element arrays around a nil.
        let mut bytes = vec![0x91; 10];
        bytes.push(0xc0);

        let err = reader(&bytes).skip().unwrap_err();
        assert!(matches!(err, ProtocolError::DepthLimitExceeded { max: 8 }));
    }

    #[test]
    fn test_try_read_nil() {
        let mut r = reader(&[0xc0, 0x01]);
        assert!(r.try_read_nil().unwrap());
        assert!(!r.try_read_nil().unwrap());
        assert_eq!(r.read_int::<u8>().unwrap(), 1);
    }

    #[test]
    fn test_type_mismatch_leaves_cursor() {
        let mut r = reader(&[0xa1, b'x']);
        assert!(matches!(r.read_bool(), Err(ProtocolError::MalformedFrame(_))));
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_str().unwrap(), "x");
    }

    #[test]
    fn test_read_f64_widens_f32() {
        let mut w = WireWriter::new();
        w.write_f32(0.5).unwrap();
        w.write_f64(2.25).unwrap();
        let bytes = w.into_bytes();

        let mut r = reader(&bytes);
        assert_eq!(r.read_f64().unwrap(), 0.5);
        assert_eq!(r.read_f64().unwrap(), 2.25);
    }

    #[test]
    fn test_skip_map_and_ext() {
        // {1: "a"}, fixext1 (type 5, one byte), then 9.
        let bytes = [0x81, 0x01, 0xa1, b'a', 0xd4, 0x05, 0xee, 0x09];
        let mut r = reader(&bytes);
        r.skip().unwrap();
        r.skip().unwrap();
        assert_eq!(r.read_int::<u8>().unwrap(), 9);
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_array16_header() {
        let mut w = WireWriter::new();
        w.write_array_len(20).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![0xdc, 0x00, 0x14]);
        assert_eq!(reader(&bytes).read_array_len().unwrap(), 20);
    }
}
