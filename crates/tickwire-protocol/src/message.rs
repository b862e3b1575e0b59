//! Position-based message encoding.
//!
//! Every message goes on the wire as one MessagePack array whose first
//! element is the tag:
//!
//! ```text
//! [ tag, field1, field2, ... ]
//! ```
//!
//! Implement [`Message`] for a type and register it with
//! [`FormatterTable::with_message`](crate::FormatterTable::with_message).
//! The [`MessageFormatter`] takes care of the array header, the tag,
//! tolerating fields appended by newer peers, and failing closed when a
//! required field is missing.
//!
//! ```rust
//! use tickwire_protocol::{
//!     CodecRegistry, Envelope, FieldReader, FieldWriter, FormatterTable, Message,
//!     MessageType, ProtocolError,
//! };
//!
//! #[derive(Debug, PartialEq)]
//! struct Chat {
//!     envelope: Envelope,
//!     text: String,
//! }
//!
//! impl Message for Chat {
//!     const BODY_FIELDS: u32 = 1;
//!
//!     fn envelope(&self) -> Envelope {
//!         self.envelope
//!     }
//!
//!     fn write_body(&self, fields: &mut FieldWriter<'_>) -> Result<(), ProtocolError> {
//!         fields.field(&self.text)
//!     }
//!
//!     fn read_body(envelope: Envelope, fields: &mut FieldReader<'_, '_>) -> Result<Self, ProtocolError> {
//!         Ok(Chat { envelope, text: fields.field()? })
//!     }
//! }
//!
//! let registry = CodecRegistry::builder()
//!     .standard()
//!     .provider(FormatterTable::new("game").with_message::<Chat>())
//!     .build()
//!     .unwrap();
//!
//! let chat = Chat { envelope: Envelope::try_new(12).unwrap(), text: "gg".into() };
//! let frame = registry.encode(&chat).unwrap();
//! assert_eq!(registry.extract_tag(&frame).unwrap(), MessageType::from_u8(12));
//! assert_eq!(registry.decode::<Chat>(&frame).unwrap(), chat);
//! ```

use std::marker::PhantomData;

use crate::format::Formatter;
use crate::wire::{WireReader, WireWriter};
use crate::{CodecRegistry, Envelope, MessageType, ProtocolError};

/// A type that travels as a tagged, position-based MessagePack array.
pub trait Message: Sized + Send + Sync + 'static {
    /// Number of fields after the tag that [`write_body`](Self::write_body)
    /// writes.
    const BODY_FIELDS: u32;

    /// The envelope (and so the tag) this value is sent with.
    fn envelope(&self) -> Envelope;

    /// Writes exactly [`BODY_FIELDS`](Self::BODY_FIELDS) fields.
    fn write_body(&self, fields: &mut FieldWriter<'_>) -> Result<(), ProtocolError>;

    /// Rebuilds the message from its envelope and the fields that
    /// followed the tag.
    fn read_body(
        envelope: Envelope,
        fields: &mut FieldReader<'_, '_>,
    ) -> Result<Self, ProtocolError>;
}

/// The bare envelope is itself a message with no body: `[tag]`.
impl Message for Envelope {
    const BODY_FIELDS: u32 = 0;

    fn envelope(&self) -> Envelope {
        *self
    }

    fn write_body(&self, _fields: &mut FieldWriter<'_>) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_body(
        envelope: Envelope,
        _fields: &mut FieldReader<'_, '_>,
    ) -> Result<Self, ProtocolError> {
        Ok(envelope)
    }
}

impl Envelope {
    /// Checks that a decoded envelope carries `expected`.
    ///
    /// Handy in [`Message::read_body`] for messages bound to one tag.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedFrame`] on mismatch.
    pub fn expect(self, expected: MessageType) -> Result<Self, ProtocolError> {
        if self.message_type() == expected {
            Ok(self)
        } else {
            Err(ProtocolError::malformed(format!(
                "expected message type {expected}, found {}",
                self.message_type()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// FieldWriter / FieldReader
// ---------------------------------------------------------------------------

/// Writes the body fields of one message.
pub struct FieldWriter<'w> {
    writer: &'w mut WireWriter,
    resolver: &'w CodecRegistry,
    written: u32,
}

impl FieldWriter<'_> {
    /// Writes one field using whatever formatter the registry resolves
    /// for `T`.
    pub fn field<T: 'static>(&mut self, value: &T) -> Result<(), ProtocolError> {
        self.resolver.write_value(value, self.writer)?;
        self.written += 1;
        Ok(())
    }

    /// Writes an optional field: `nil` for `None`.
    pub fn optional<T: 'static>(&mut self, value: Option<&T>) -> Result<(), ProtocolError> {
        match value {
            Some(value) => self.field(value),
            None => {
                self.writer.write_nil()?;
                self.written += 1;
                Ok(())
            }
        }
    }
}

/// Reads the body fields of one message, in order.
///
/// Required fields ([`field`](Self::field)) fail when the sender wrote
/// fewer fields than expected. Optional fields
/// ([`optional`](Self::optional)) read as `None` when absent or `nil`.
pub struct FieldReader<'r, 'a> {
    reader: &'r mut WireReader<'a>,
    resolver: &'r CodecRegistry,
    remaining: u32,
    index: u32,
}

impl FieldReader<'_, '_> {
    /// Reads the next required field.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedFrame`] if the frame has no more fields.
    pub fn field<T: 'static>(&mut self) -> Result<T, ProtocolError> {
        if self.remaining == 0 {
            return Err(ProtocolError::malformed(format!(
                "missing required field {} ({})",
                self.index + 1,
                std::any::type_name::<T>()
            )));
        }
        self.advance();
        self.resolver.read_value(self.reader)
    }

    /// Reads the next optional field.
    pub fn optional<T: 'static>(&mut self) -> Result<Option<T>, ProtocolError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.advance();
        if self.reader.try_read_nil()? {
            return Ok(None);
        }
        self.resolver.read_value(self.reader).map(Some)
    }

    /// Fields the sender wrote that have not been read yet.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    fn advance(&mut self) {
        self.remaining -= 1;
        self.index += 1;
    }

    /// Skips whatever the message type didn't read: fields added by a
    /// newer version of the sender.
    fn skip_rest(&mut self) -> Result<(), ProtocolError> {
        if self.remaining > 0 {
            tracing::trace!(skipped = self.remaining, "skipping unknown trailing fields");
        }
        while self.remaining > 0 {
            self.reader.skip()?;
            self.remaining -= 1;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MessageFormatter
// ---------------------------------------------------------------------------

/// The [`Formatter`] for any [`Message`] type.
pub struct MessageFormatter<M>(PhantomData<fn() -> M>);

impl<M> MessageFormatter<M> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<M> Default for MessageFormatter<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message> Formatter<M> for MessageFormatter<M> {
    fn write(
        &self,
        value: &M,
        writer: &mut WireWriter,
        resolver: &CodecRegistry,
    ) -> Result<(), ProtocolError> {
        writer.write_array_len(M::BODY_FIELDS + 1)?;
        writer.write_uint(u64::from(value.envelope().message_type().get()))?;

        let mut fields = FieldWriter {
            writer,
            resolver,
            written: 0,
        };
        value.write_body(&mut fields)?;
        if fields.written != M::BODY_FIELDS {
            return Err(ProtocolError::Encode(format!(
                "{} declares {} body fields but wrote {}",
                std::any::type_name::<M>(),
                M::BODY_FIELDS,
                fields.written
            )));
        }
        Ok(())
    }

    fn read(
        &self,
        reader: &mut WireReader<'_>,
        resolver: &CodecRegistry,
    ) -> Result<M, ProtocolError> {
        reader.enter()?;
        let len = reader.read_array_len()?;
        if len == 0 {
            return Err(ProtocolError::malformed("empty message array has no tag"));
        }
        let raw = reader.read_int::<i64>()?;
        let message_type = MessageType::new(raw)
            .map_err(|_| ProtocolError::malformed(format!("tag {raw} out of range")))?;

        let mut fields = FieldReader {
            reader,
            resolver,
            remaining: len - 1,
            index: 0,
        };
        let message = M::read_body(Envelope::new(message_type), &mut fields)?;
        fields.skip_rest()?;
        reader.leave();
        Ok(message)
    }
}
