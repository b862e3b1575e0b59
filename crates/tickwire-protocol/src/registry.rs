//! The codec registry: an ordered resolver chain plus the top-level
//! encode/decode entry points.

use std::any::TypeId;
use std::fmt;

use serde::{Deserialize, Serialize};
use tickwire_transport::Frame;

use crate::format::Formatter;
use crate::provider::{FormatterProvider, FormatterTable};
use crate::wire::{WireReader, WireWriter};
use crate::{Envelope, MessageType, ProtocolError};

/// Default maximum container nesting accepted when decoding.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Codec settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum container nesting depth. The outer message array counts
    /// as one level.
    pub max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// ---------------------------------------------------------------------------
// CodecRegistry
// ---------------------------------------------------------------------------

/// Encodes and decodes typed values through an ordered chain of
/// [`FormatterProvider`]s.
///
/// For each type, the first provider that has a formatter wins; later
/// providers are a fallback, never merged. The registry is immutable once
/// built, so share it with `Arc<CodecRegistry>`.
pub struct CodecRegistry {
    providers: Vec<Box<dyn FormatterProvider>>,
    config: CodecConfig,
}

impl CodecRegistry {
    /// Starts an empty builder.
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::default()
    }

    /// A registry with only the standard provider.
    ///
    /// # Errors
    /// Only if the self-test fails, which would indicate a bug.
    pub fn standard() -> Result<Self, ProtocolError> {
        Self::builder().standard().build()
    }

    /// The formatter the chain resolves for `T`.
    ///
    /// # Errors
    /// [`ProtocolError::FormatterNotFound`] if no provider supports `T`.
    pub fn formatter<T: 'static>(&self) -> Result<&dyn Formatter<T>, ProtocolError> {
        let type_id = TypeId::of::<T>();
        self.providers
            .iter()
            .filter_map(|provider| provider.lookup(type_id))
            .find_map(|entry| entry.downcast::<T>())
            .ok_or(ProtocolError::FormatterNotFound(std::any::type_name::<T>()))
    }

    /// Whether any provider can format `T`.
    pub fn supports<T: 'static>(&self) -> bool {
        self.formatter::<T>().is_ok()
    }

    /// Names of the installed providers, in resolution order.
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }

    pub fn config(&self) -> CodecConfig {
        self.config
    }

    /// Writes a nested value. Used by formatters for their fields.
    pub fn write_value<T: 'static>(
        &self,
        value: &T,
        writer: &mut WireWriter,
    ) -> Result<(), ProtocolError> {
        self.formatter::<T>()?.write(value, writer, self)
    }

    /// Reads a nested value. Used by formatters for their fields.
    pub fn read_value<T: 'static>(&self, reader: &mut WireReader<'_>) -> Result<T, ProtocolError> {
        self.formatter::<T>()?.read(reader, self)
    }

    /// Encodes `value` into a frame.
    ///
    /// # Errors
    /// [`ProtocolError::FormatterNotFound`] or [`ProtocolError::Encode`].
    pub fn encode<T: 'static>(&self, value: &T) -> Result<Frame, ProtocolError> {
        let mut writer = WireWriter::new();
        self.write_value(value, &mut writer)?;
        Ok(writer.into_frame())
    }

    /// Decodes a whole frame as one `T`.
    ///
    /// A `nil` frame is rejected here; use
    /// [`decode_optional`](Self::decode_optional) when absence is valid.
    ///
    /// # Errors
    /// - [`ProtocolError::FormatterNotFound`] if no provider supports `T`
    ///   (checked before looking at the bytes)
    /// - [`ProtocolError::MalformedFrame`] on a layout mismatch or bytes
    ///   left over after the value
    /// - [`ProtocolError::DepthLimitExceeded`] on excessive nesting
    pub fn decode<T: 'static>(&self, frame: &[u8]) -> Result<T, ProtocolError> {
        let formatter = self.formatter::<T>()?;
        let mut reader = self.reader(frame);
        if reader.try_read_nil()? {
            return Err(ProtocolError::malformed(format!(
                "nil frame where {} was expected",
                std::any::type_name::<T>()
            )));
        }
        let value = formatter.read(&mut reader, self)?;
        Self::finish(&reader)?;
        Ok(value)
    }

    /// Encodes a value that may be absent. `None` becomes a single `nil`.
    pub fn encode_optional<T: 'static>(&self, value: Option<&T>) -> Result<Frame, ProtocolError> {
        let formatter = self.formatter::<T>()?;
        let mut writer = WireWriter::new();
        match value {
            Some(value) => formatter.write(value, &mut writer, self)?,
            None => writer.write_nil()?,
        }
        Ok(writer.into_frame())
    }

    /// Decodes a frame written by [`encode_optional`](Self::encode_optional).
    pub fn decode_optional<T: 'static>(&self, frame: &[u8]) -> Result<Option<T>, ProtocolError> {
        let formatter = self.formatter::<T>()?;
        let mut reader = self.reader(frame);
        if reader.try_read_nil()? {
            Self::finish(&reader)?;
            return Ok(None);
        }
        let value = formatter.read(&mut reader, self)?;
        Self::finish(&reader)?;
        Ok(Some(value))
    }

    /// Reads just the tag. See [`extract_tag`](crate::extract_tag).
    pub fn extract_tag(&self, frame: &[u8]) -> Result<MessageType, ProtocolError> {
        crate::tag::extract_tag(frame)
    }

    fn reader<'a>(&self, frame: &'a [u8]) -> WireReader<'a> {
        WireReader::new(frame, self.config.max_depth)
    }

    fn finish(reader: &WireReader<'_>) -> Result<(), ProtocolError> {
        if reader.is_exhausted() {
            Ok(())
        } else {
            Err(ProtocolError::malformed(format!(
                "{} trailing bytes after value",
                reader.remaining().len()
            )))
        }
    }

    /// Round-trips a known envelope through the chain.
    fn self_test(&self) -> Result<(), ProtocolError> {
        let probe = Envelope::new(MessageType::MAX);
        let failed = |e: ProtocolError| ProtocolError::SelfTestFailed(e.to_string());

        let frame = self.encode(&probe).map_err(failed)?;
        let decoded: Envelope = self.decode(&frame).map_err(failed)?;
        if decoded != probe {
            return Err(ProtocolError::SelfTestFailed(format!(
                "envelope decoded as {decoded:?}, expected {probe:?}"
            )));
        }
        let tag = self.extract_tag(&frame).map_err(failed)?;
        if tag != probe.message_type() {
            return Err(ProtocolError::SelfTestFailed(format!(
                "extracted tag {tag}, expected {}",
                probe.message_type()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("providers", &self.provider_names().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles the resolver chain in order.
#[derive(Default)]
pub struct CodecRegistryBuilder {
    providers: Vec<Box<dyn FormatterProvider>>,
    config: CodecConfig,
}

impl CodecRegistryBuilder {
    /// Appends the standard provider.
    pub fn standard(self) -> Self {
        self.provider(FormatterTable::standard())
    }

    /// Appends `provider` to the chain.
    ///
    /// A provider whose name is already installed is ignored, so
    /// installing the same chain twice leaves it unchanged.
    pub fn provider(mut self, provider: impl FormatterProvider) -> Self {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            tracing::debug!(provider = provider.name(), "provider already installed, skipping");
            return self;
        }
        self.providers.push(Box::new(provider));
        self
    }

    /// Sets the decode nesting limit.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    /// Finishes the chain and verifies it.
    ///
    /// # Errors
    /// [`ProtocolError::SelfTestFailed`] if the chain cannot round-trip an
    /// [`Envelope`] (for instance when no provider formats it).
    pub fn build(self) -> Result<CodecRegistry, ProtocolError> {
        let registry = CodecRegistry {
            providers: self.providers,
            config: self.config,
        };
        registry.self_test()?;
        tracing::debug!(
            providers = ?registry.provider_names().collect::<Vec<_>>(),
            max_depth = registry.config.max_depth,
            "codec registry ready"
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PrimitiveFormatter;

    #[test]
    fn test_standard_registry_builds() {
        let registry = CodecRegistry::standard().unwrap();
        assert_eq!(registry.provider_names().collect::<Vec<_>>(), vec!["standard"]);
        assert_eq!(registry.config().max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_empty_chain_fails_self_test() {
        let err = CodecRegistry::builder().build().unwrap_err();
        assert!(matches!(err, ProtocolError::SelfTestFailed(_)));
    }

    #[test]
    fn test_installing_twice_is_noop() {
        let registry = CodecRegistry::builder().standard().standard().build().unwrap();
        assert_eq!(registry.provider_names().count(), 1);
    }

    #[test]
    fn test_first_provider_wins() {
        // A formatter that writes every u32 as the string "x".
        struct Shouty;
        impl Formatter<u32> for Shouty {
            fn write(&self, _: &u32, w: &mut WireWriter, _: &CodecRegistry) -> Result<(), ProtocolError> {
                w.write_str("x")
            }
            fn read(&self, r: &mut WireReader<'_>, _: &CodecRegistry) -> Result<u32, ProtocolError> {
                r.read_str().map(|_| 0)
            }
        }

        let registry = CodecRegistry::builder()
            .provider(FormatterTable::new("override").with::<u32, _>(Shouty))
            .standard()
            .build()
            .unwrap();
        let frame = registry.encode(&7u32).unwrap();
        assert_eq!(frame.as_bytes(), &[0xa1, b'x']);

        // Later in the chain, the override is only a fallback.
        let registry = CodecRegistry::builder()
            .standard()
            .provider(FormatterTable::new("override").with::<u32, _>(Shouty))
            .build()
            .unwrap();
        assert_eq!(registry.encode(&7u32).unwrap().as_bytes(), &[0x07]);
    }

    #[test]
    fn test_fallback_provider_used_for_missing_types() {
        let registry = CodecRegistry::builder()
            .provider(FormatterTable::new("tiny").with::<u8, _>(PrimitiveFormatter))
            .standard()
            .build()
            .unwrap();
        assert!(registry.supports::<u8>());
        assert!(registry.supports::<String>());
        assert!(!registry.supports::<Vec<bool>>());
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let registry = CodecRegistry::standard().unwrap();
        let err = registry.decode::<u8>(&[0x01, 0x02]).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_decode_rejects_nil() {
        let registry = CodecRegistry::standard().unwrap();
        let err = registry.decode::<String>(&[0xc0]).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }
}
