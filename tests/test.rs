use anyhow::Result;
use assert_matches::assert_matches;
use num_bigint::BigInt;

use blink_codec::types::{dynamic_reference, enum_of, int, reference, sequence, string};
use blink_codec::{
    Codec, CodecOptions, DecodingError, EncodingError, Error, GroupValue, SchemaBuilder, TypeDef, Value,
};

fn payload_schema() -> blink_codec::Schema {
    SchemaBuilder::new()
        .group("Payload")
        .id(1)
        .field("bool1", TypeDef::Boolean)
        .required()
        .end_field()
        .field("bool2", TypeDef::Boolean)
        .end_field()
        .end_group()
        .build()
}

#[test]
fn frame_roundtrip_with_required_and_null_fields() -> Result<()> {
    let schema = payload_schema();
    let (codec, diagnostics) = Codec::compile(schema, CodecOptions::default())?;
    assert!(diagnostics.is_empty());

    let value = GroupValue::new("Payload")
        .with_field("bool1", Value::Bool(false))
        .with_field("bool2", None);

    let mut wire = Vec::new();
    codec.encode(&value, &mut wire)?;

    let decoded = codec.decode(&wire[..])?.expect("one frame");
    assert_eq!(decoded.type_name, "Payload");
    assert_eq!(decoded.group_id, Some(1));
    assert_eq!(decoded.get("bool1"), Some(&Value::Bool(false)));
    assert_eq!(decoded.get("bool2"), None);

    Ok(())
}

#[test]
fn dynamic_reference_round_trips_the_concrete_subgroup() -> Result<()> {
    let schema = SchemaBuilder::new()
        .group("Shape")
        .id(1)
        .end_group()
        .group("Circle")
        .id(2)
        .super_group("Shape")
        .field("radius", int(32, false))
        .required()
        .end_field()
        .end_group()
        .group("Square")
        .id(3)
        .super_group("Shape")
        .field("side", int(32, false))
        .required()
        .end_field()
        .end_group()
        .group("Drawing")
        .id(4)
        .field("shape", dynamic_reference(Some("Shape")))
        .required()
        .end_field()
        .end_group()
        .build();

    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    let circle = GroupValue::new("Circle").with_field("radius", Value::UInt(7));
    let drawing = GroupValue::new("Drawing").with_field("shape", Value::Group(Box::new(circle)));

    let mut wire = Vec::new();
    codec.encode(&drawing, &mut wire)?;

    let decoded = codec.decode(&wire[..])?.expect("one frame");
    let shape = decoded.get("shape").expect("shape field present");
    assert_matches!(shape, Value::Group(g) if g.type_name == "Circle" && g.get("radius") == Some(&Value::UInt(7)));

    Ok(())
}

#[test]
fn sequence_of_references_round_trips_in_order() -> Result<()> {
    let schema = SchemaBuilder::new()
        .group("Point")
        .id(1)
        .field("x", int(32, true))
        .required()
        .end_field()
        .field("y", int(32, true))
        .required()
        .end_field()
        .end_group()
        .group("Path")
        .id(2)
        .field("name", string())
        .end_field()
        .field("points", sequence(reference("Point")))
        .required()
        .end_field()
        .end_group()
        .build();

    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    let points = Value::Sequence(vec![
        Value::Group(Box::new(
            GroupValue::new("Point").with_field("x", Value::Int(1)).with_field("y", Value::Int(2)),
        )),
        Value::Group(Box::new(
            GroupValue::new("Point").with_field("x", Value::Int(-3)).with_field("y", Value::Int(4)),
        )),
    ]);
    let path = GroupValue::new("Path")
        .with_field("name", Value::String("diagonal".into()))
        .with_field("points", points);

    let mut wire = Vec::new();
    codec.encode(&path, &mut wire)?;
    let decoded = codec.decode(&wire[..])?.expect("one frame");

    let Some(Value::Sequence(items)) = decoded.get("points") else {
        panic!("expected a sequence");
    };
    assert_eq!(items.len(), 2);
    assert_matches!(&items[1], Value::Group(g) if g.get("x") == Some(&Value::Int(-3)));

    Ok(())
}

#[test]
fn truncated_frame_fails_cleanly() -> Result<()> {
    let schema = payload_schema();
    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    let value = GroupValue::new("Payload").with_field("bool1", Value::Bool(true));
    let mut wire = Vec::new();
    codec.encode(&value, &mut wire)?;
    wire.truncate(wire.len() - 1);

    let err = codec.decode(&wire[..]).unwrap_err();
    assert_matches!(err, Error::Decoding(DecodingError::Truncated));

    Ok(())
}

#[test]
fn trailing_unknown_bytes_within_a_frame_are_skipped() -> Result<()> {
    let schema = payload_schema();
    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    let value = GroupValue::new("Payload").with_field("bool1", Value::Bool(true));
    let mut wire = Vec::new();
    codec.encode(&value, &mut wire)?;

    // Simulate a sender built against a newer schema that appended a field
    // this reader doesn't know about: widen the declared frame size and
    // splice in extra bytes before the frame's end.
    let header_len = 1 + 3; // frame_size_width header byte + 3-byte width.
    let mut patched = wire[..header_len].to_vec();
    let extra = [0xAAu8, 0xBB];
    let new_payload_len = (wire.len() - header_len + extra.len()) as u32;
    patched[1..4].copy_from_slice(&new_payload_len.to_le_bytes()[..3]);
    patched.extend_from_slice(&wire[header_len..]);
    patched.extend_from_slice(&extra);

    let decoded = codec.decode(&patched[..])?.expect("one frame");
    assert_eq!(decoded.get("bool1"), Some(&Value::Bool(true)));

    Ok(())
}

#[test]
fn decode_returns_none_on_a_clean_empty_stream() -> Result<()> {
    let schema = payload_schema();
    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;
    assert_matches!(codec.decode(&[][..])?, None);
    Ok(())
}

#[test]
fn frame_overrun_is_detected_when_payload_exceeds_declared_size() -> Result<()> {
    let schema = payload_schema();
    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    let value = GroupValue::new("Payload").with_field("bool1", Value::Bool(true));
    let mut wire = Vec::new();
    codec.encode(&value, &mut wire)?;

    // Shrink the declared 3-byte frame size by one so the real payload
    // reads one byte past what the frame promised.
    let declared = u32::from_le_bytes([wire[1], wire[2], wire[3], 0]);
    wire[1..4].copy_from_slice(&(declared - 1).to_le_bytes()[..3]);

    let err = codec.decode(&wire[..]).unwrap_err();
    assert_matches!(err, Error::Decoding(DecodingError::FrameOverrun { .. }));

    Ok(())
}

#[test]
fn unknown_group_id_is_rejected() -> Result<()> {
    let schema = payload_schema();
    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    let value = GroupValue::new("Payload").with_field("bool1", Value::Bool(true));
    let mut wire = Vec::new();
    codec.encode(&value, &mut wire)?;

    let header_len = 1 + 3;
    assert_eq!(wire[header_len], 0x01); // Payload's declared id, one-byte VLC.
    wire[header_len] = 99;

    let err = codec.decode(&wire[..]).unwrap_err();
    assert_matches!(err, Error::Decoding(DecodingError::UnknownGroupId(99)));

    Ok(())
}

#[test]
fn dynamic_reference_rejects_a_group_outside_the_permitted_set() -> Result<()> {
    let schema = SchemaBuilder::new()
        .group("Shape")
        .id(1)
        .end_group()
        .group("Circle")
        .id(2)
        .super_group("Shape")
        .field("radius", int(32, false))
        .required()
        .end_field()
        .end_group()
        .group("Vehicle")
        .id(5)
        .field("wheels", int(8, false))
        .required()
        .end_field()
        .end_group()
        .group("Drawing")
        .id(4)
        .field("shape", dynamic_reference(Some("Shape")))
        .required()
        .end_field()
        .end_group()
        .build();

    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    // Encode-side: "Vehicle" is a real, compiled group, just not one of the
    // subgroups a "Shape" dynamic reference permits.
    let vehicle = GroupValue::new("Vehicle").with_field("wheels", Value::UInt(4));
    let drawing = GroupValue::new("Drawing").with_field("shape", Value::Group(Box::new(vehicle)));
    let err = codec.encode(&drawing, &mut Vec::new()).unwrap_err();
    assert_matches!(
        err,
        Error::Encoding(EncodingError::DynamicGroupTypeNotPermitted { .. })
    );

    // Decode-side: splice a registered-but-not-permitted group id into an
    // otherwise valid dynamic subframe.
    let circle = GroupValue::new("Circle").with_field("radius", Value::UInt(7));
    let ok_drawing = GroupValue::new("Drawing").with_field("shape", Value::Group(Box::new(circle)));
    let mut wire = Vec::new();
    codec.encode(&ok_drawing, &mut wire)?;

    let header_len = 1 + 3;
    let sub_len_idx = header_len + 1; // past Drawing's own one-byte group id.
    let inner_group_id_idx = sub_len_idx + 1;
    assert_eq!(wire[inner_group_id_idx], 0x02); // Circle's id.
    wire[inner_group_id_idx] = 0x05; // Vehicle's id: registered, wrong family.

    let err = codec.decode(&wire[..]).unwrap_err();
    assert_matches!(
        err,
        Error::Decoding(DecodingError::DynamicGroupTypeNotPermitted { .. })
    );

    Ok(())
}

#[test]
fn enum_round_trips_and_rejects_unknown_values_on_strict_decode() -> Result<()> {
    let schema = SchemaBuilder::new()
        .group("Light")
        .id(1)
        .field("color", enum_of([("Red", 0), ("Yellow", 1), ("Green", 2)]))
        .required()
        .end_field()
        .end_group()
        .build();
    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    let value = GroupValue::new("Light").with_field("color", Value::Enum(1));
    let mut wire = Vec::new();
    codec.encode(&value, &mut wire)?;
    let decoded = codec.decode(&wire[..])?.expect("one frame");
    assert_eq!(decoded.get("color"), Some(&Value::Enum(1)));

    // Encoding doesn't check membership in the symbol table; splice in a
    // value outside it to exercise the strict decode-side rejection.
    let bogus = GroupValue::new("Light").with_field("color", Value::Enum(42));
    let mut bogus_wire = Vec::new();
    codec.encode(&bogus, &mut bogus_wire)?;
    let err = codec.decode(&bogus_wire[..]).unwrap_err();
    assert_matches!(err, Error::Decoding(DecodingError::InvalidEnumValue { .. }));

    Ok(())
}

#[test]
fn decimal_and_bigdecimal_round_trip() -> Result<()> {
    let schema = SchemaBuilder::new()
        .group("Money")
        .id(1)
        .field("amount", TypeDef::Decimal)
        .required()
        .end_field()
        .field("precise", TypeDef::BigDecimal)
        .required()
        .end_field()
        .end_group()
        .build();
    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    let big_mantissa = BigInt::from(i64::MAX) + BigInt::from(1);
    let value = GroupValue::new("Money")
        .with_field("amount", Value::Decimal { mantissa: 12345, exponent: -2 })
        .with_field(
            "precise",
            Value::BigDecimal { mantissa: big_mantissa.clone(), exponent: -6 },
        );

    let mut wire = Vec::new();
    codec.encode(&value, &mut wire)?;
    let decoded = codec.decode(&wire[..])?.expect("one frame");
    assert_eq!(
        decoded.get("amount"),
        Some(&Value::Decimal { mantissa: 12345, exponent: -2 })
    );
    assert_eq!(
        decoded.get("precise"),
        Some(&Value::BigDecimal { mantissa: big_mantissa, exponent: -6 })
    );

    Ok(())
}

#[test]
fn null_static_and_dynamic_group_references_use_the_shared_null_marker() -> Result<()> {
    let schema = SchemaBuilder::new()
        .group("Shape")
        .id(1)
        .end_group()
        .group("Circle")
        .id(2)
        .super_group("Shape")
        .field("radius", int(32, false))
        .required()
        .end_field()
        .end_group()
        .group("Drawing")
        .id(3)
        .field("outline", reference("Circle"))
        .end_field()
        .field("shape", dynamic_reference(Some("Shape")))
        .end_field()
        .end_group()
        .build();
    let (codec, _) = Codec::compile(schema, CodecOptions::default())?;

    let drawing = GroupValue::new("Drawing")
        .with_field("outline", None)
        .with_field("shape", None);
    let mut wire = Vec::new();
    codec.encode(&drawing, &mut wire)?;

    let header_len = 1 + 3;
    assert_eq!(wire[header_len + 1], 0xC0); // "outline": null static-group marker.
    assert_eq!(wire[header_len + 2], 0xC0); // "shape": null dynamic-group marker.

    let decoded = codec.decode(&wire[..])?.expect("one frame");
    assert_eq!(decoded.get("outline"), None);
    assert_eq!(decoded.get("shape"), None);

    Ok(())
}
