//! The [`Formatter`] trait and the built-in formatters.
//!
//! A formatter knows how to write one Rust type to a [`WireWriter`] and
//! read it back from a [`WireReader`]. Formatters for container types
//! don't know how to format their elements; they ask the resolver (the
//! [`CodecRegistry`]) for the element formatter at runtime, which is what
//! lets an application register `Vec<MyThing>` without writing a new
//! sequence formatter.

use std::marker::PhantomData;

use crate::wire::{WireReader, WireWriter};
use crate::{CodecRegistry, ProtocolError};

/// Converts values of type `T` to and from MessagePack.
///
/// `Send + Sync + 'static` because a registry is built once and shared
/// by `Arc` between the dispatch loop and whatever else sends messages.
pub trait Formatter<T>: Send + Sync + 'static {
    /// Appends `value` to `writer`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] (or `FormatterNotFound` for a
    /// nested type nobody can format).
    fn write(
        &self,
        value: &T,
        writer: &mut WireWriter,
        resolver: &CodecRegistry,
    ) -> Result<(), ProtocolError>;

    /// Reads one `T` from `reader`, consuming exactly its bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedFrame`] when the bytes don't
    /// match, or [`ProtocolError::DepthLimitExceeded`] on deep nesting.
    fn read(
        &self,
        reader: &mut WireReader<'_>,
        resolver: &CodecRegistry,
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Formats integers, floats, `bool` and `String`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveFormatter;

macro_rules! int_formatter {
    ($($ty:ty => $write:ident($wide:ty)),* $(,)?) => {$(
        impl Formatter<$ty> for PrimitiveFormatter {
            fn write(
                &self,
                value: &$ty,
                writer: &mut WireWriter,
                _resolver: &CodecRegistry,
            ) -> Result<(), ProtocolError> {
                writer.$write(<$wide>::from(*value))
            }

            fn read(
                &self,
                reader: &mut WireReader<'_>,
                _resolver: &CodecRegistry,
            ) -> Result<$ty, ProtocolError> {
                reader.read_int::<$ty>()
            }
        }
    )*};
}

int_formatter! {
    u8 => write_uint(u64),
    u16 => write_uint(u64),
    u32 => write_uint(u64),
    u64 => write_uint(u64),
    i8 => write_sint(i64),
    i16 => write_sint(i64),
    i32 => write_sint(i64),
    i64 => write_sint(i64),
}

impl Formatter<bool> for PrimitiveFormatter {
    fn write(&self, value: &bool, writer: &mut WireWriter, _: &CodecRegistry) -> Result<(), ProtocolError> {
        writer.write_bool(*value)
    }

    fn read(&self, reader: &mut WireReader<'_>, _: &CodecRegistry) -> Result<bool, ProtocolError> {
        reader.read_bool()
    }
}

impl Formatter<f32> for PrimitiveFormatter {
    fn write(&self, value: &f32, writer: &mut WireWriter, _: &CodecRegistry) -> Result<(), ProtocolError> {
        writer.write_f32(*value)
    }

    fn read(&self, reader: &mut WireReader<'_>, _: &CodecRegistry) -> Result<f32, ProtocolError> {
        reader.read_f32()
    }
}

impl Formatter<f64> for PrimitiveFormatter {
    fn write(&self, value: &f64, writer: &mut WireWriter, _: &CodecRegistry) -> Result<(), ProtocolError> {
        writer.write_f64(*value)
    }

    fn read(&self, reader: &mut WireReader<'_>, _: &CodecRegistry) -> Result<f64, ProtocolError> {
        reader.read_f64()
    }
}

impl Formatter<String> for PrimitiveFormatter {
    fn write(&self, value: &String, writer: &mut WireWriter, _: &CodecRegistry) -> Result<(), ProtocolError> {
        writer.write_str(value)
    }

    fn read(&self, reader: &mut WireReader<'_>, _: &CodecRegistry) -> Result<String, ProtocolError> {
        reader.read_str().map(str::to_owned)
    }
}

// ---------------------------------------------------------------------------
// Bytes
// ---------------------------------------------------------------------------

/// Formats `Vec<u8>` as a MessagePack `bin` blob rather than an array of
/// integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesFormatter;

impl Formatter<Vec<u8>> for BytesFormatter {
    fn write(&self, value: &Vec<u8>, writer: &mut WireWriter, _: &CodecRegistry) -> Result<(), ProtocolError> {
        writer.write_bin(value)
    }

    fn read(&self, reader: &mut WireReader<'_>, _: &CodecRegistry) -> Result<Vec<u8>, ProtocolError> {
        reader.read_bin().map(<[u8]>::to_vec)
    }
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

/// Formats `Vec<T>` as a MessagePack array, resolving `T`'s formatter
/// through the registry for each element.
pub struct SeqFormatter<T>(PhantomData<fn() -> T>);

impl<T> SeqFormatter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SeqFormatter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Formatter<Vec<T>> for SeqFormatter<T> {
    fn write(
        &self,
        value: &Vec<T>,
        writer: &mut WireWriter,
        resolver: &CodecRegistry,
    ) -> Result<(), ProtocolError> {
        let len = u32::try_from(value.len()).map_err(|_| {
            ProtocolError::Encode(format!("sequence of {} elements is too long", value.len()))
        })?;
        let element = resolver.formatter::<T>()?;
        writer.write_array_len(len)?;
        for item in value {
            element.write(item, writer, resolver)?;
        }
        Ok(())
    }

    fn read(
        &self,
        reader: &mut WireReader<'_>,
        resolver: &CodecRegistry,
    ) -> Result<Vec<T>, ProtocolError> {
        let element = resolver.formatter::<T>()?;
        reader.enter()?;
        let len = reader.read_array_len()? as usize;
        // Every element takes at least one byte, so a header claiming more
        // elements than there are bytes left is lying.
        let mut items = Vec::with_capacity(len.min(reader.remaining().len()));
        for _ in 0..len {
            items.push(element.read(reader, resolver)?);
        }
        reader.leave();
        Ok(items)
    }
}
