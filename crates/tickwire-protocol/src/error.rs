//! Error types for the protocol layer.
//!
//! Everything that can go wrong between "typed value" and "bytes" lands
//! here. None of these errors are fatal to a connection: a frame that
//! fails to decode is one bad frame, and the next one is decoded as if
//! nothing happened.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A message type outside `0..=255` was requested.
    ///
    /// Raised when the tag is constructed, so a frame carrying an invalid
    /// tag can never be encoded.
    #[error("invalid message type {0}: must be in 0..=255")]
    InvalidMessageType(i64),

    /// No provider in the resolver chain can format this type.
    #[error("no formatter registered for {0}")]
    FormatterNotFound(&'static str),

    /// The bytes do not have the expected shape: truncated buffer, wrong
    /// marker, missing required field, trailing garbage.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The payload nests deeper than the configured guard allows.
    #[error("nesting depth exceeds limit of {max}")]
    DepthLimitExceeded {
        /// The configured maximum depth.
        max: usize,
    },

    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// A freshly built registry could not round-trip its probe value.
    #[error("codec self-test failed: {0}")]
    SelfTestFailed(String),
}

impl ProtocolError {
    /// Shorthand for [`ProtocolError::MalformedFrame`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFrame(reason.into())
    }

    /// Returns `true` for errors caused by the bytes of an incoming frame.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame(_) | Self::FormatterNotFound(_) | Self::DepthLimitExceeded { .. }
        )
    }
}
