//! Integration tests for the codec registry.
//!
//! These go through the public API only: build a registry, encode typed
//! values, decode them back, and poke at hand-written frames.

use tickwire_protocol::wire::WireWriter;
use tickwire_protocol::{
    CodecRegistry, Envelope, FieldReader, FieldWriter, FormatterTable, Message, MessageType,
    ProtocolError,
};

// =========================================================================
// Test messages
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
struct Move {
    envelope: Envelope,
    x: f32,
    y: f32,
    emote: Option<String>,
}

impl Message for Move {
    const BODY_FIELDS: u32 = 3;

    fn envelope(&self) -> Envelope {
        self.envelope
    }

    fn write_body(&self, fields: &mut FieldWriter<'_>) -> Result<(), ProtocolError> {
        fields.field(&self.x)?;
        fields.field(&self.y)?;
        fields.optional(self.emote.as_ref())
    }

    fn read_body(envelope: Envelope, fields: &mut FieldReader<'_, '_>) -> Result<Self, ProtocolError> {
        Ok(Move {
            envelope,
            x: fields.field()?,
            y: fields.field()?,
            emote: fields.optional()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Roster {
    envelope: Envelope,
    names: Vec<String>,
    scores: Vec<i32>,
    avatar: Vec<u8>,
}

impl Message for Roster {
    const BODY_FIELDS: u32 = 3;

    fn envelope(&self) -> Envelope {
        self.envelope
    }

    fn write_body(&self, fields: &mut FieldWriter<'_>) -> Result<(), ProtocolError> {
        fields.field(&self.names)?;
        fields.field(&self.scores)?;
        fields.field(&self.avatar)
    }

    fn read_body(envelope: Envelope, fields: &mut FieldReader<'_, '_>) -> Result<Self, ProtocolError> {
        Ok(Roster {
            envelope,
            names: fields.field()?,
            scores: fields.field()?,
            avatar: fields.field()?,
        })
    }
}

/// Never registered anywhere.
#[derive(Debug)]
struct Unregistered;

fn registry() -> CodecRegistry {
    CodecRegistry::builder()
        .standard()
        .provider(
            FormatterTable::new("game")
                .with_message::<Move>()
                .with_message::<Roster>(),
        )
        .build()
        .expect("registry")
}

fn envelope(tag: u8) -> Envelope {
    Envelope::new(MessageType::from_u8(tag))
}

// =========================================================================
// Round trips
// =========================================================================

#[test]
fn test_envelope_roundtrip_every_tag() {
    let registry = registry();
    for tag in 0..=255u8 {
        let env = envelope(tag);
        let frame = registry.encode(&env).unwrap();
        assert_eq!(registry.decode::<Envelope>(&frame).unwrap(), env, "tag {tag}");
        assert_eq!(registry.extract_tag(&frame).unwrap().get(), tag, "tag {tag}");
    }
}

#[test]
fn test_message_roundtrip_every_tag() {
    let registry = registry();
    for tag in 0..=255u8 {
        let msg = Move {
            envelope: envelope(tag),
            x: f32::from(tag) * 0.5,
            y: -1.25,
            emote: (tag % 2 == 0).then(|| format!("wave-{tag}")),
        };
        let frame = registry.encode(&msg).unwrap();
        assert_eq!(registry.extract_tag(&frame).unwrap().get(), tag);
        assert_eq!(registry.decode::<Move>(&frame).unwrap(), msg);
    }
}

#[test]
fn test_collections_roundtrip() {
    let registry = registry();
    let roster = Roster {
        envelope: envelope(130),
        names: vec!["ada".into(), "grace".into(), String::new()],
        scores: vec![-5, 0, 70_000],
        avatar: vec![0xde, 0xad, 0xbe, 0xef],
    };
    let frame = registry.encode(&roster).unwrap();
    assert_eq!(registry.decode::<Roster>(&frame).unwrap(), roster);
}

#[test]
fn test_optional_roundtrip() {
    let registry = registry();

    let none = registry.encode_optional::<Move>(None).unwrap();
    assert_eq!(none.as_bytes(), &[0xc0]);
    assert_eq!(registry.decode_optional::<Move>(&none).unwrap(), None);

    let none = registry.encode_optional::<String>(None).unwrap();
    assert_eq!(registry.decode_optional::<String>(&none).unwrap(), None);

    let some = registry.encode_optional(Some(&"hi".to_string())).unwrap();
    assert_eq!(
        registry.decode_optional::<String>(&some).unwrap(),
        Some("hi".to_string())
    );
}

// =========================================================================
// Compatibility
// =========================================================================

#[test]
fn test_extra_trailing_fields_are_skipped() {
    let registry = registry();

    // A newer sender appended two fields, one of them nested.
    let mut w = WireWriter::new();
    w.write_array_len(6).unwrap();
    w.write_uint(9).unwrap();
    w.write_f32(1.0).unwrap();
    w.write_f32(2.0).unwrap();
    w.write_nil().unwrap();
    w.write_str("future").unwrap();
    w.write_array_len(2).unwrap();
    w.write_uint(1).unwrap();
    w.write_uint(2).unwrap();

    let decoded = registry.decode::<Move>(&w.into_bytes()).unwrap();
    assert_eq!(decoded.envelope.message_type().get(), 9);
    assert_eq!(decoded.x, 1.0);
    assert_eq!(decoded.emote, None);
}

#[test]
fn test_missing_optional_field_defaults_to_none() {
    let registry = registry();

    // An older sender that never wrote the emote field.
    let mut w = WireWriter::new();
    w.write_array_len(3).unwrap();
    w.write_uint(9).unwrap();
    w.write_f32(1.0).unwrap();
    w.write_f32(2.0).unwrap();

    let decoded = registry.decode::<Move>(&w.into_bytes()).unwrap();
    assert_eq!(decoded.emote, None);
}

#[test]
fn test_missing_required_field_fails() {
    let registry = registry();

    let mut w = WireWriter::new();
    w.write_array_len(2).unwrap();
    w.write_uint(9).unwrap();
    w.write_f32(1.0).unwrap();

    let err = registry.decode::<Move>(&w.into_bytes()).unwrap_err();
    assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    assert!(err.to_string().contains("missing required field"));
}

// =========================================================================
// Failures
// =========================================================================

#[test]
fn test_unregistered_type_is_formatter_not_found() {
    let registry = registry();
    let frame = registry.encode(&envelope(1)).unwrap();

    let err = registry.decode::<Unregistered>(&frame).unwrap_err();
    assert!(matches!(err, ProtocolError::FormatterNotFound(_)));
    assert!(err.is_decode_error());

    let err = registry.encode(&Unregistered).unwrap_err();
    assert!(matches!(err, ProtocolError::FormatterNotFound(_)));

    // The registry is unaffected.
    assert_eq!(registry.decode::<Envelope>(&frame).unwrap(), envelope(1));
}

#[test]
fn test_truncated_frame_is_malformed() {
    let registry = registry();
    let msg = Move {
        envelope: envelope(3),
        x: 1.0,
        y: 2.0,
        emote: Some("long enough".into()),
    };
    let frame = registry.encode(&msg).unwrap();
    let cut = &frame.as_bytes()[..frame.len() - 4];

    let err = registry.decode::<Move>(cut).unwrap_err();
    assert!(matches!(err, ProtocolError::MalformedFrame(_)));
}

#[test]
fn test_nesting_beyond_limit_is_rejected() {
    let registry = CodecRegistry::builder()
        .standard()
        .provider(
            FormatterTable::new("nested")
                .with_seq::<Vec<i32>>()
                .with_seq::<Vec<Vec<i32>>>(),
        )
        .max_depth(2)
        .build()
        .unwrap();

    let shallow = registry.encode(&vec![vec![1i32, 2]]).unwrap();
    assert_eq!(
        registry.decode::<Vec<Vec<i32>>>(&shallow).unwrap(),
        vec![vec![1, 2]]
    );

    let deep = registry.encode(&vec![vec![vec![1i32]]]).unwrap();
    let err = registry.decode::<Vec<Vec<Vec<i32>>>>(&deep).unwrap_err();
    assert!(matches!(err, ProtocolError::DepthLimitExceeded { max: 2 }));
}

#[test]
fn test_tag_mismatch_via_expect() {
    let env = envelope(4);
    assert!(env.expect(MessageType::from_u8(4)).is_ok());
    assert!(env.expect(MessageType::from_u8(5)).is_err());
}
