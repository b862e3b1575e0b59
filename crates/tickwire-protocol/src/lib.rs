//! Wire protocol for Tickwire.
//!
//! This crate defines what a message looks like in bytes and how typed
//! values get there and back:
//!
//! - **Types** ([`MessageType`], [`Envelope`]): the tag every message
//!   carries, valid by construction.
//! - **Messages** ([`Message`], [`MessageFormatter`]): position-based
//!   MessagePack arrays whose first element is the tag.
//! - **Formatters and providers** ([`Formatter`], [`FormatterProvider`],
//!   [`FormatterTable`]): how a single type is encoded, and who supplies
//!   formatters for which types.
//! - **Registry** ([`CodecRegistry`]): the ordered resolver chain plus
//!   `encode` / `decode` / `extract_tag`.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (frames) and the
//! dispatcher (handlers). It knows nothing about sockets or ticks.
//!
//! ```text
//! Transport (Frame) → Protocol (MessageType, typed value) → Dispatch (handler)
//! ```

mod bridge;
mod error;
mod format;
mod message;
mod provider;
mod registry;
mod tag;
mod types;
pub mod wire;

pub use bridge::SerdeFormatter;
pub use error::ProtocolError;
pub use format::{BytesFormatter, Formatter, PrimitiveFormatter, SeqFormatter};
pub use message::{FieldReader, FieldWriter, Message, MessageFormatter};
pub use provider::{FormatterEntry, FormatterProvider, FormatterTable};
pub use registry::{CodecConfig, CodecRegistry, CodecRegistryBuilder, DEFAULT_MAX_DEPTH};
pub use tag::extract_tag;
pub use tickwire_transport::Frame;
pub use types::{Envelope, MessageType};
