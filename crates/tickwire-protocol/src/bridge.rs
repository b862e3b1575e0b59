//! Serde-backed formatting via `rmp-serde`.
//!
//! Lets any `Serialize + DeserializeOwned` type join the resolver chain
//! without a hand-written [`Formatter`]. Structs are written as arrays
//! (field order = declaration order), which matches the position-based
//! layout of [`Message`](crate::Message) bodies.
//!
//! Unlike `MessageFormatter`, serde decoding is strict about field
//! counts: extra trailing fields fail unless the type itself tolerates
//! them. Use `#[serde(default)]` for fields that may be missing.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::format::Formatter;
use crate::wire::{WireReader, WireWriter};
use crate::{CodecRegistry, ProtocolError};

/// A [`Formatter`] that delegates to `T`'s serde implementation.
pub struct SerdeFormatter<T>(PhantomData<fn() -> T>);

impl<T> SerdeFormatter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SerdeFormatter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Formatter<T> for SerdeFormatter<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn write(
        &self,
        value: &T,
        writer: &mut WireWriter,
        _resolver: &CodecRegistry,
    ) -> Result<(), ProtocolError> {
        rmp_serde::encode::write(writer.buffer_mut(), value)
            .map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    fn read(
        &self,
        reader: &mut WireReader<'_>,
        _resolver: &CodecRegistry,
    ) -> Result<T, ProtocolError> {
        // Walk the value first so the depth guard and truncation checks
        // apply before serde sees the bytes.
        let mut probe = reader.clone();
        probe.skip()?;

        let mut rest = reader.remaining();
        let before = rest.len();
        let mut de = rmp_serde::Deserializer::new(&mut rest);
        let value = T::deserialize(&mut de).map_err(|e| {
            ProtocolError::malformed(format!("{}: {e}", std::any::type_name::<T>()))
        })?;
        let consumed = before - rest.len();
        reader.advance(consumed);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::FormatterTable;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: f32,
        y: f32,
        label: String,
    }

    fn registry() -> CodecRegistry {
        CodecRegistry::builder()
            .standard()
            .provider(FormatterTable::new("test").with_serde::<Position>())
            .build()
            .unwrap()
    }

    #[test]
    fn test_serde_struct_roundtrip() {
        let registry = registry();
        let pos = Position {
            x: 1.5,
            y: -2.0,
            label: "spawn".into(),
        };
        let frame = registry.encode(&pos).unwrap();
        // Positional: a 3-element array, not a map.
        assert_eq!(frame.as_bytes()[0], 0x93);
        assert_eq!(registry.decode::<Position>(&frame).unwrap(), pos);
    }

    #[test]
    fn test_serde_missing_field_is_malformed() {
        let registry = registry();
        // [1.0f32, 2.0f32] — label missing.
        let mut w = WireWriter::new();
        w.write_array_len(2).unwrap();
        w.write_f32(1.0).unwrap();
        w.write_f32(2.0).unwrap();
        let err = registry.decode::<Position>(&w.into_bytes()).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[test]
    fn test_serde_respects_depth_limit() {
        let registry = CodecRegistry::builder()
            .standard()
            .provider(FormatterTable::new("test").with_serde::<Vec<Vec<Vec<u8>>>>())
            .max_depth(2)
            .build()
            .unwrap();
        let frame = registry.encode(&vec![vec![vec![1u8]]]).unwrap();
        let err = registry.decode::<Vec<Vec<Vec<u8>>>>(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::DepthLimitExceeded { max: 2 }));
    }
}
