//! Formatter providers: the links of the registry's resolver chain.
//!
//! A provider answers one question: "do you have a formatter for this
//! type?". The registry asks each provider in order and takes the first
//! answer, so an application can put its own provider in front of the
//! standard one to override how, say, `String` is encoded.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bridge::SerdeFormatter;
use crate::format::{BytesFormatter, Formatter, PrimitiveFormatter, SeqFormatter};
use crate::message::{Message, MessageFormatter};
use crate::{Envelope, MessageType};

/// A type-erased `Box<dyn Formatter<T>>`.
pub struct FormatterEntry {
    type_name: &'static str,
    formatter: Box<dyn Any + Send + Sync>,
}

impl FormatterEntry {
    /// Erases `formatter`, remembering which `T` it formats.
    pub fn new<T: 'static, F: Formatter<T>>(formatter: F) -> Self {
        let boxed: Box<dyn Formatter<T>> = Box::new(formatter);
        Self {
            type_name: std::any::type_name::<T>(),
            formatter: Box::new(boxed),
        }
    }

    /// Recovers the formatter, or `None` if this entry is for another type.
    pub fn downcast<T: 'static>(&self) -> Option<&dyn Formatter<T>> {
        self.formatter
            .downcast_ref::<Box<dyn Formatter<T>>>()
            .map(|boxed| boxed.as_ref())
    }

    /// Name of the formatted type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for FormatterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterEntry")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// One link of the resolver chain.
pub trait FormatterProvider: Send + Sync + 'static {
    /// Identifies the provider. The registry treats two providers with the
    /// same name as the same provider.
    fn name(&self) -> &str;

    /// Returns the formatter for the type with id `type_id`, if any.
    fn lookup(&self, type_id: TypeId) -> Option<&FormatterEntry>;
}

// ---------------------------------------------------------------------------
// FormatterTable
// ---------------------------------------------------------------------------

/// A [`FormatterProvider`] backed by a `TypeId -> formatter` map.
///
/// Built with chained `with_*` calls. Registering a type twice keeps the
/// later formatter.
pub struct FormatterTable {
    name: String,
    entries: HashMap<TypeId, FormatterEntry>,
}

impl FormatterTable {
    /// Name of the table returned by [`FormatterTable::standard`].
    pub const STANDARD: &'static str = "standard";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    /// Registers `formatter` for `T`.
    pub fn with<T: 'static, F: Formatter<T>>(mut self, formatter: F) -> Self {
        self.insert::<T, F>(formatter);
        self
    }

    /// Registers `formatter` for `T` in place.
    pub fn insert<T: 'static, F: Formatter<T>>(&mut self, formatter: F) {
        if self
            .entries
            .insert(TypeId::of::<T>(), FormatterEntry::new(formatter))
            .is_some()
        {
            tracing::debug!(
                table = %self.name,
                ty = std::any::type_name::<T>(),
                "formatter replaced"
            );
        }
    }

    /// Registers a [`Message`] type.
    pub fn with_message<M: Message>(self) -> Self {
        self.with::<M, _>(MessageFormatter::<M>::new())
    }

    /// Registers `Vec<T>` as an array of `T`. `T` itself must be
    /// resolvable somewhere in the chain.
    pub fn with_seq<T: 'static>(self) -> Self {
        self.with::<Vec<T>, _>(SeqFormatter::<T>::new())
    }

    /// Registers `T` through its serde implementation (struct fields by
    /// position).
    pub fn with_serde<T>(self) -> Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.with::<T, _>(SerdeFormatter::<T>::new())
    }

    /// Whether this table formats `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The built-in table: integers, floats, `bool`, `String`, `Vec<u8>`
    /// (as `bin`), common vectors, [`MessageType`] and [`Envelope`].
    pub fn standard() -> Self {
        Self::new(Self::STANDARD)
            .with::<u8, _>(PrimitiveFormatter)
            .with::<u16, _>(PrimitiveFormatter)
            .with::<u32, _>(PrimitiveFormatter)
            .with::<u64, _>(PrimitiveFormatter)
            .with::<i8, _>(PrimitiveFormatter)
            .with::<i16, _>(PrimitiveFormatter)
            .with::<i32, _>(PrimitiveFormatter)
            .with::<i64, _>(PrimitiveFormatter)
            .with::<bool, _>(PrimitiveFormatter)
            .with::<f32, _>(PrimitiveFormatter)
            .with::<f64, _>(PrimitiveFormatter)
            .with::<String, _>(PrimitiveFormatter)
            .with::<Vec<u8>, _>(BytesFormatter)
            .with_seq::<String>()
            .with_seq::<u32>()
            .with_seq::<i32>()
            .with_seq::<i64>()
            .with_seq::<f32>()
            .with_seq::<f64>()
            .with_serde::<MessageType>()
            .with_message::<Envelope>()
    }
}

impl FormatterProvider for FormatterTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, type_id: TypeId) -> Option<&FormatterEntry> {
        self.entries.get(&type_id)
    }
}

impl fmt::Debug for FormatterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterTable")
            .field("name", &self.name)
            .field("types", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_downcasts_only_to_its_type() {
        let entry = FormatterEntry::new::<u32, _>(PrimitiveFormatter);
        assert!(entry.downcast::<u32>().is_some());
        assert!(entry.downcast::<u64>().is_none());
        assert_eq!(entry.type_name(), "u32");
    }

    #[test]
    fn test_standard_table_contents() {
        let table = FormatterTable::standard();
        assert_eq!(table.name(), FormatterTable::STANDARD);
        assert!(table.contains::<u8>());
        assert!(table.contains::<String>());
        assert!(table.contains::<Vec<u8>>());
        assert!(table.contains::<Vec<String>>());
        assert!(table.contains::<Envelope>());
        assert!(!table.contains::<Vec<bool>>());
    }

    #[test]
    fn test_reinserting_replaces_entry() {
        let table = FormatterTable::new("t")
            .with::<u8, _>(PrimitiveFormatter)
            .with::<u8, _>(PrimitiveFormatter);
        assert_eq!(table.len(), 1);
    }
}
