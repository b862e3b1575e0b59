//! Core protocol types: the message tag and the envelope every message
//! carries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The tag that identifies a message's shape.
///
/// A newtype over `u8`, so the valid range `0..=255` is enforced by the
/// type itself: once you hold a `MessageType`, it is valid. The fallible
/// constructor [`MessageType::new`] exists for tags that arrive as wider
/// integers (config files, scripting, other languages' numbering).
///
/// `#[serde(transparent)]` serializes it as the bare integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageType(u8);

impl MessageType {
    /// Smallest valid tag.
    pub const MIN: Self = Self(0);
    /// Largest valid tag.
    pub const MAX: Self = Self(u8::MAX);

    /// Creates a tag from any integer, rejecting values outside `0..=255`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessageType`] for out-of-range values.
    pub fn new(value: i64) -> Result<Self, ProtocolError> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidMessageType(value))
    }

    /// Creates a tag from a byte. Infallible: every `u8` is a valid tag.
    pub const fn from_u8(value: u8) -> Self {
        Self(value)
    }

    /// The raw tag value.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value.0
    }
}

impl TryFrom<i64> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i32> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

/// `{}` prints `#7`, which reads well in log lines like
/// "dropping #7: no handler".
impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The base record every message carries: just the message type.
///
/// On the wire the envelope is the first field of the message array:
///
/// ```text
/// [ tag, field1, field2, ... ]
///   ^^^ envelope
/// ```
///
/// Concrete messages embed an `Envelope` (see [`Message`](crate::Message))
/// rather than inheriting from it. The tag is private and has no setter:
/// an envelope is built once, right before encoding, and rebuilt once,
/// right after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Envelope {
    message_type: MessageType,
}

impl Envelope {
    /// Creates an envelope for an already-validated tag.
    pub const fn new(message_type: MessageType) -> Self {
        Self { message_type }
    }

    /// Creates an envelope from a raw integer tag.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessageType`] if `value` is outside
    /// `0..=255`; no envelope is produced.
    pub fn try_new(value: i64) -> Result<Self, ProtocolError> {
        MessageType::new(value).map(Self::new)
    }

    /// The message type this envelope carries.
    pub const fn message_type(&self) -> MessageType {
        self.message_type
    }
}

impl From<MessageType> for Envelope {
    fn from(message_type: MessageType) -> Self {
        Self::new(message_type)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_accepts_range_bounds() {
        assert_eq!(MessageType::new(0).unwrap(), MessageType::MIN);
        assert_eq!(MessageType::new(255).unwrap(), MessageType::MAX);
    }

    #[test]
    fn test_message_type_rejects_out_of_range() {
        assert!(matches!(
            MessageType::new(-1),
            Err(ProtocolError::InvalidMessageType(-1))
        ));
        assert!(matches!(
            MessageType::new(256),
            Err(ProtocolError::InvalidMessageType(256))
        ));
        assert!(MessageType::try_from(59114i32).is_err());
    }

    #[test]
    fn test_envelope_construction_bounds() {
        assert!(Envelope::try_new(-1).is_err());
        assert!(Envelope::try_new(256).is_err());
        assert_eq!(Envelope::try_new(0).unwrap().message_type().get(), 0);
        assert_eq!(Envelope::try_new(255).unwrap().message_type().get(), 255);
    }

    #[test]
    fn test_message_type_display() {
        assert_eq!(MessageType::from_u8(7).to_string(), "#7");
    }

    #[test]
    fn test_message_type_u8_conversions() {
        let tag = MessageType::from(200u8);
        assert_eq!(u8::from(tag), 200);
        assert_eq!(tag.get(), 200);
    }
}
