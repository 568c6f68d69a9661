//! 4.E: the group dispatcher. Binds compiled [`GroupInstructions`] to a
//! [`Schema`] so fields can be resolved by name (encode, keyed on
//! `GroupValue::type_name`) or by id (decode, keyed on the wire's group id),
//! and drives the recursive encode/decode of [`Value`]/[`GroupValue`] trees
//! against those instructions.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Arc;

use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::compiler::{
    self, Diagnostics, DynamicGroupTarget, FieldInstruction, GroupInstructions, PrimitiveType,
    ValueCodec,
};
use crate::config::CodecOptions;
use crate::primitives::{self, vlc};
use crate::result::{DecodingError, EncodingError, Error, Result, SchemaError};
use crate::schema::{EnumSymbol, Schema};
use crate::value::{GroupValue, Value};

/// A [`Schema`] plus its compiled field instructions, indexed both ways.
#[derive(Debug)]
pub struct CompiledSchema {
    schema: Schema,
    by_name: IndexMap<String, Arc<GroupInstructions>>,
    by_id: HashMap<u64, Arc<GroupInstructions>>,
}

impl CompiledSchema {
    pub fn compile(schema: Schema, options: &CodecOptions) -> Result<(Self, Diagnostics), SchemaError> {
        let (by_name, diagnostics) = compiler::compile(&schema, options)?;
        let by_id = by_name
            .values()
            .filter_map(|g| g.group_id.map(|id| (id, g.clone())))
            .collect();
        Ok((
            Self {
                schema,
                by_name,
                by_id,
            },
            diagnostics,
        ))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<GroupInstructions>> {
        self.by_name.get(name)
    }

    pub fn by_id(&self, id: u64) -> Option<&Arc<GroupInstructions>> {
        self.by_id.get(&id)
    }
}

fn type_mismatch(name: &str) -> Error {
    EncodingError::TypeMismatch(name.to_string()).into()
}

fn expect_bool(name: &str, v: &Value) -> Result<bool> {
    match v {
        Value::Bool(b) => Ok(*b),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_f32(name: &str, v: &Value) -> Result<f32> {
    match v {
        Value::Float32(f) => Ok(*f),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_f64(name: &str, v: &Value) -> Result<f64> {
    match v {
        Value::Float64(f) => Ok(*f),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_decimal(name: &str, v: &Value) -> Result<(i64, i8)> {
    match v {
        Value::Decimal { mantissa, exponent } => Ok((*mantissa, *exponent)),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_bigint(name: &str, v: &Value) -> Result<&BigInt> {
    match v {
        Value::BigInt(b) => Ok(b),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_bigdecimal(name: &str, v: &Value) -> Result<(&BigInt, i64)> {
    match v {
        Value::BigDecimal { mantissa, exponent } => Ok((mantissa, *exponent)),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_string(name: &str, v: &Value) -> Result<&str> {
    match v {
        Value::String(s) => Ok(s.as_str()),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_binary(name: &str, v: &Value) -> Result<&[u8]> {
    match v {
        Value::Binary(b) => Ok(b.as_slice()),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_time(name: &str, v: &Value) -> Result<u64> {
    match v {
        Value::Time(t) => Ok(*t),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_enum(name: &str, v: &Value) -> Result<i32> {
    match v {
        Value::Enum(e) => Ok(*e),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_group<'a>(name: &str, v: &'a Value) -> Result<&'a GroupValue> {
    match v {
        Value::Group(g) => Ok(g.as_ref()),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_sequence<'a>(name: &str, v: &'a Value) -> Result<&'a [Value]> {
    match v {
        Value::Sequence(items) => Ok(items.as_slice()),
        _ => Err(type_mismatch(name)),
    }
}

fn expect_signed_int(name: &str, v: &Value, width: u8) -> Result<i64> {
    let raw = match v {
        Value::Int(i) => *i,
        Value::UInt(u) => i64::try_from(*u).map_err(|_| EncodingError::ValueOutOfRange {
            value: *u as i128,
            width: width as u32,
            signed: "signed",
        })?,
        _ => return Err(type_mismatch(name)),
    };
    if width < 64 {
        let min = -(1i64 << (width - 1));
        let max = (1i64 << (width - 1)) - 1;
        if raw < min || raw > max {
            return Err(EncodingError::ValueOutOfRange {
                value: raw as i128,
                width: width as u32,
                signed: "signed",
            }
            .into());
        }
    }
    Ok(raw)
}

fn expect_unsigned_int(name: &str, v: &Value, width: u8) -> Result<u64> {
    let raw = match v {
        Value::UInt(u) => *u,
        Value::Int(i) if *i >= 0 => *i as u64,
        Value::Int(i) => {
            return Err(EncodingError::ValueOutOfRange {
                value: *i as i128,
                width: width as u32,
                signed: "unsigned",
            }
            .into())
        }
        _ => return Err(type_mismatch(name)),
    };
    if width < 64 {
        let max = (1u64 << width) - 1;
        if raw > max {
            return Err(EncodingError::ValueOutOfRange {
                value: raw as i128,
                width: width as u32,
                signed: "unsigned",
            }
            .into());
        }
    }
    Ok(raw)
}

fn bits_needed_unsigned(v: u64) -> usize {
    (64 - v.leading_zeros()).max(1) as usize
}

fn bits_needed_signed(v: i64) -> usize {
    if v >= 0 {
        bits_needed_unsigned(v as u64) + 1
    } else {
        bits_needed_unsigned(!v as u64) + 1
    }
}

fn check_signed_width(v: i64, width: u8) -> Result<()> {
    if width < 64 {
        let min = -(1i64 << (width - 1));
        let max = (1i64 << (width - 1)) - 1;
        if v < min || v > max {
            return Err(DecodingError::Overflow {
                declared: bits_needed_signed(v),
                max: width as usize,
            }
            .into());
        }
    }
    Ok(())
}

fn check_unsigned_width(v: u64, width: u8) -> Result<()> {
    if width < 64 {
        let max = (1u64 << width) - 1;
        if v > max {
            return Err(DecodingError::Overflow {
                declared: bits_needed_unsigned(v),
                max: width as usize,
            }
            .into());
        }
    }
    Ok(())
}

fn write_primitive<W: Write>(
    name: &str,
    prim: &PrimitiveType,
    value: Option<&Value>,
    w: &mut W,
) -> Result<()> {
    match prim {
        PrimitiveType::Boolean => {
            let v = value.map(|v| expect_bool(name, v)).transpose()?;
            primitives::encode_bool(w, v)?;
        }
        PrimitiveType::Int { width, signed } => {
            if *signed {
                let v = value.map(|v| expect_signed_int(name, v, *width)).transpose()?;
                vlc::encode_signed_opt(w, v)?;
            } else {
                let v = value.map(|v| expect_unsigned_int(name, v, *width)).transpose()?;
                vlc::encode_unsigned_opt(w, v)?;
            }
        }
        PrimitiveType::Float32 => {
            let v = value.map(|v| expect_f32(name, v)).transpose()?;
            primitives::encode_float32(w, v)?;
        }
        PrimitiveType::Float64 => {
            let v = value.map(|v| expect_f64(name, v)).transpose()?;
            primitives::encode_float64(w, v)?;
        }
        PrimitiveType::Decimal => {
            let v = value.map(|v| expect_decimal(name, v)).transpose()?;
            primitives::encode_decimal(w, v)?;
        }
        PrimitiveType::BigInt => {
            let v = value.map(|v| expect_bigint(name, v)).transpose()?;
            primitives::encode_bigint(w, v)?;
        }
        PrimitiveType::BigDecimal => {
            let v = value.map(|v| expect_bigdecimal(name, v)).transpose()?;
            primitives::encode_bigdecimal(w, v)?;
        }
        PrimitiveType::String => {
            let v = value.map(|v| expect_string(name, v)).transpose()?;
            primitives::encode_string(w, v)?;
        }
        PrimitiveType::Binary => {
            let v = value.map(|v| expect_binary(name, v)).transpose()?;
            primitives::encode_binary(w, v)?;
        }
        PrimitiveType::Time { .. } => {
            let v = value.map(|v| expect_time(name, v)).transpose()?;
            primitives::encode_time(w, v)?;
        }
    }
    Ok(())
}

fn read_primitive<R: Read>(prim: &PrimitiveType, r: &mut R) -> Result<Option<Value>> {
    Ok(match prim {
        PrimitiveType::Boolean => primitives::decode_bool(r)?.map(Value::Bool),
        PrimitiveType::Int { width, signed } => {
            if *signed {
                match vlc::decode_signed(r)? {
                    None => None,
                    Some(v) => {
                        check_signed_width(v, *width)?;
                        Some(Value::Int(v))
                    }
                }
            } else {
                match vlc::decode_unsigned(r)? {
                    None => None,
                    Some(v) => {
                        check_unsigned_width(v, *width)?;
                        Some(Value::UInt(v))
                    }
                }
            }
        }
        PrimitiveType::Float32 => primitives::decode_float32(r)?.map(Value::Float32),
        PrimitiveType::Float64 => primitives::decode_float64(r)?.map(Value::Float64),
        PrimitiveType::Decimal => primitives::decode_decimal(r)?
            .map(|(mantissa, exponent)| Value::Decimal { mantissa, exponent }),
        PrimitiveType::BigInt => primitives::decode_bigint(r)?.map(Value::BigInt),
        PrimitiveType::BigDecimal => primitives::decode_bigdecimal(r)?
            .map(|(mantissa, exponent)| Value::BigDecimal { mantissa, exponent }),
        PrimitiveType::String => primitives::decode_string(r)?.map(Value::String),
        PrimitiveType::Binary => primitives::decode_binary(r)?.map(Value::Binary),
        PrimitiveType::Time { .. } => primitives::decode_time(r)?.map(Value::Time),
    })
}

fn read_enum<R: Read>(
    field_name: &str,
    symbols: &[EnumSymbol],
    options: &CodecOptions,
    r: &mut R,
) -> Result<Option<Value>> {
    match primitives::decode_enum(r)? {
        None => Ok(None),
        Some(v) => {
            if symbols.iter().any(|s| s.value == v) || options.lenient_enum_decode {
                Ok(Some(Value::Enum(v)))
            } else {
                Err(DecodingError::InvalidEnumValue {
                    enum_name: field_name.to_string(),
                    value: v,
                }
                .into())
            }
        }
    }
}

fn write_static_group<W: Write>(
    dispatch: &CompiledSchema,
    field_name: &str,
    target_name: &str,
    value: Option<&Value>,
    options: &CodecOptions,
    w: &mut W,
) -> Result<()> {
    let Some(value) = value else {
        vlc::encode_null(w)?;
        return Ok(());
    };
    let group = expect_group(field_name, value)?;
    if group.type_name != *target_name {
        return Err(type_mismatch(field_name));
    }
    let instructions = dispatch
        .by_name(target_name)
        .expect("static group targets are validated to exist at schema-compile time")
        .clone();
    let mut scratch = Vec::new();
    encode_group_fields(dispatch, &instructions, group, options, &mut scratch)?;
    vlc::encode_unsigned(w, scratch.len() as u64)?;
    w.write_all(&scratch)?;
    Ok(())
}

fn write_dynamic_group<W: Write>(
    dispatch: &CompiledSchema,
    field_name: &str,
    target: &DynamicGroupTarget,
    value: Option<&Value>,
    options: &CodecOptions,
    w: &mut W,
) -> Result<()> {
    let Some(value) = value else {
        vlc::encode_null(w)?;
        return Ok(());
    };
    let group = expect_group(field_name, value)?;
    if !target.permits_name(&group.type_name) {
        return Err(EncodingError::DynamicGroupTypeNotPermitted {
            root: target.root.clone().unwrap_or_else(|| "<any>".to_string()),
            actual: group.type_name.clone(),
        }
        .into());
    }
    let instructions = dispatch
        .by_name(&group.type_name)
        .expect("dynamic target membership implies the group was compiled")
        .clone();
    let group_id = instructions
        .group_id
        .expect("dynamic targets are validated to carry an id at compile time");
    let mut scratch = Vec::new();
    vlc::encode_unsigned(&mut scratch, group_id)?;
    encode_group_fields(dispatch, &instructions, group, options, &mut scratch)?;
    vlc::encode_unsigned(w, scratch.len() as u64)?;
    w.write_all(&scratch)?;
    Ok(())
}

fn write_sequence_of_primitive<W: Write>(
    field_name: &str,
    prim: &PrimitiveType,
    value: Option<&Value>,
    w: &mut W,
) -> Result<()> {
    let Some(value) = value else {
        vlc::encode_null(w)?;
        return Ok(());
    };
    let items = expect_sequence(field_name, value)?;
    vlc::encode_unsigned(w, items.len() as u64)?;
    for item in items {
        write_primitive(field_name, prim, Some(item), w)?;
    }
    Ok(())
}

fn write_sequence_of_group<W: Write>(
    dispatch: &CompiledSchema,
    field_name: &str,
    inner: &ValueCodec,
    value: Option<&Value>,
    options: &CodecOptions,
    w: &mut W,
) -> Result<()> {
    let Some(value) = value else {
        vlc::encode_null(w)?;
        return Ok(());
    };
    let items = expect_sequence(field_name, value)?;
    vlc::encode_unsigned(w, items.len() as u64)?;
    for item in items {
        match inner {
            ValueCodec::StaticGroup(target) => {
                write_static_group(dispatch, field_name, target, Some(item), options, w)?
            }
            ValueCodec::DynamicGroup(target) => {
                write_dynamic_group(dispatch, field_name, target, Some(item), options, w)?
            }
            _ => unreachable!("compiler only produces group-shaped sequence elements here"),
        }
    }
    Ok(())
}

fn encode_field<W: Write>(
    dispatch: &CompiledSchema,
    field: &FieldInstruction,
    value: Option<&Value>,
    options: &CodecOptions,
    w: &mut W,
) -> Result<()> {
    match &field.codec {
        ValueCodec::Primitive(prim) => write_primitive(&field.name, prim, value, w),
        ValueCodec::Enum(_) => {
            let v = value.map(|v| expect_enum(&field.name, v)).transpose()?;
            primitives::encode_enum(w, v)?;
            Ok(())
        }
        ValueCodec::StaticGroup(target) => {
            write_static_group(dispatch, &field.name, target, value, options, w)
        }
        ValueCodec::DynamicGroup(target) => {
            write_dynamic_group(dispatch, &field.name, target, value, options, w)
        }
        ValueCodec::SequenceOfPrimitive(prim) => {
            write_sequence_of_primitive(&field.name, prim, value, w)
        }
        ValueCodec::SequenceOfGroup(inner) => {
            write_sequence_of_group(dispatch, &field.name, inner, value, options, w)
        }
    }
}

/// Encodes `value`'s fields in instruction order, without any group-level
/// framing (no length prefix, no group id) — the caller supplies that
/// context, whether it's the framed frontend (`framing`) or a nested group
/// reference (`write_static_group`/`write_dynamic_group` above).
pub(crate) fn encode_group_fields<W: Write>(
    dispatch: &CompiledSchema,
    instructions: &GroupInstructions,
    value: &GroupValue,
    options: &CodecOptions,
    w: &mut W,
) -> Result<()> {
    if value.type_name != instructions.group_name {
        return Err(type_mismatch(&value.type_name));
    }
    for field in &instructions.fields {
        let slot = value.fields.get(&field.name).and_then(|v| v.as_ref());
        if slot.is_none() && field.required {
            return Err(EncodingError::MissingRequiredField(field.name.clone()).into());
        }
        encode_field(dispatch, field, slot, options, w)?;
    }
    Ok(())
}

fn read_field<R: Read>(
    dispatch: &CompiledSchema,
    field: &FieldInstruction,
    options: &CodecOptions,
    r: &mut R,
) -> Result<Option<Value>> {
    match &field.codec {
        ValueCodec::Primitive(prim) => read_primitive(prim, r),
        ValueCodec::Enum(symbols) => read_enum(&field.name, symbols, options, r),
        ValueCodec::StaticGroup(target) => read_static_group(dispatch, target, options, r),
        ValueCodec::DynamicGroup(target) => read_dynamic_group(dispatch, target, options, r),
        ValueCodec::SequenceOfPrimitive(prim) => read_sequence_of_primitive(&field.name, prim, r),
        ValueCodec::SequenceOfGroup(inner) => {
            read_sequence_of_group(dispatch, &field.name, inner, options, r)
        }
    }
}

fn read_static_group<R: Read>(
    dispatch: &CompiledSchema,
    target_name: &str,
    options: &CodecOptions,
    r: &mut R,
) -> Result<Option<Value>> {
    let Some(len) = vlc::decode_unsigned(r)? else {
        return Ok(None);
    };
    let instructions = dispatch
        .by_name(target_name)
        .expect("static group targets are validated to exist at schema-compile time")
        .clone();
    let mut bounded = r.take(len);
    let group = decode_group_fields(dispatch, &instructions, options, &mut bounded)?;
    skip_to_end(&mut bounded)?;
    Ok(Some(Value::Group(Box::new(group))))
}

fn read_dynamic_group<R: Read>(
    dispatch: &CompiledSchema,
    target: &DynamicGroupTarget,
    options: &CodecOptions,
    r: &mut R,
) -> Result<Option<Value>> {
    let Some(len) = vlc::decode_unsigned(r)? else {
        return Ok(None);
    };
    let mut bounded = r.take(len);
    let group_id = vlc::decode_unsigned(&mut bounded)?.ok_or(DecodingError::Truncated)?;
    if !target.permits_id(group_id) {
        return Err(DecodingError::DynamicGroupTypeNotPermitted {
            root: target.root.clone().unwrap_or_else(|| "<any>".to_string()),
            group_id,
        }
        .into());
    }
    let instructions = dispatch
        .by_id(group_id)
        .ok_or(DecodingError::UnknownGroupId(group_id))?
        .clone();
    let group = decode_group_fields(dispatch, &instructions, options, &mut bounded)?;
    skip_to_end(&mut bounded)?;
    Ok(Some(Value::Group(Box::new(group))))
}

fn read_sequence_of_primitive<R: Read>(
    field_name: &str,
    prim: &PrimitiveType,
    r: &mut R,
) -> Result<Option<Value>> {
    let Some(count) = vlc::decode_unsigned(r)? else {
        return Ok(None);
    };
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let item = read_primitive(prim, r)?
            .ok_or_else(|| DecodingError::MissingRequiredField(field_name.to_string()))?;
        items.push(item);
    }
    Ok(Some(Value::Sequence(items)))
}

fn read_sequence_of_group<R: Read>(
    dispatch: &CompiledSchema,
    field_name: &str,
    inner: &ValueCodec,
    options: &CodecOptions,
    r: &mut R,
) -> Result<Option<Value>> {
    let Some(count) = vlc::decode_unsigned(r)? else {
        return Ok(None);
    };
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let item = match inner {
            ValueCodec::StaticGroup(target) => read_static_group(dispatch, target, options, r)?,
            ValueCodec::DynamicGroup(target) => read_dynamic_group(dispatch, target, options, r)?,
            _ => unreachable!("compiler only produces group-shaped sequence elements here"),
        };
        let item =
            item.ok_or_else(|| DecodingError::MissingRequiredField(field_name.to_string()))?;
        items.push(item);
    }
    Ok(Some(Value::Sequence(items)))
}

/// Decodes one group's fields, in instruction order, from an unframed
/// reader — the caller (`framing`, or a nested group reference above) is
/// responsible for establishing the bound this reads within.
pub(crate) fn decode_group_fields<R: Read>(
    dispatch: &CompiledSchema,
    instructions: &Arc<GroupInstructions>,
    options: &CodecOptions,
    r: &mut R,
) -> Result<GroupValue> {
    let mut value = GroupValue::new(instructions.group_name.clone());
    value.group_id = instructions.group_id;
    for field in &instructions.fields {
        let decoded = read_field(dispatch, field, options, r)?;
        if decoded.is_none() && field.required {
            return Err(DecodingError::MissingRequiredField(field.name.clone()).into());
        }
        value.fields.insert(field.name.clone(), decoded);
    }
    Ok(value)
}

pub(crate) fn skip_to_end<R: Read>(r: &mut R) -> Result<u64> {
    Ok(io::copy(r, &mut io::sink())?)
}
