//! The dynamic value model field instructions read from and write into.
//!
//! Schema construction from host-language class metadata — reflective
//! accessor generation over real Rust structs — is explicitly out of
//! scope (see spec's `host binding` collaborator). [`GroupValue`] is the
//! in-scope stand-in: a `type_name`-tagged, order-preserving map that
//! plays the role of the "host object" in the schema binding contract.
//! `type_name` is the dispatch key the encode dispatcher looks up by
//! identity; `group_id`, once resolved via the schema, is the key the
//! decode dispatcher looks up by.

use indexmap::IndexMap;
use num_bigint::BigInt;

/// A decoded (or to-be-encoded) field value. Nullability is tracked one
/// level up, as `Option<Value>` in [`GroupValue::fields`], matching the
/// wire format's separate `required` flag rather than baking an explicit
/// null variant into every arm here.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    /// Fixed 64-bit mantissa, 8-bit exponent.
    Decimal { mantissa: i64, exponent: i8 },
    BigInt(BigInt),
    /// Arbitrary-precision mantissa, signed VLC exponent.
    BigDecimal { mantissa: BigInt, exponent: i64 },
    String(String),
    Binary(Vec<u8>),
    /// Count of the declared time unit since the declared epoch.
    Time(u64),
    Enum(i32),
    Group(Box<GroupValue>),
    Sequence(Vec<Value>),
}

/// The runtime stand-in for a host object: a named, ordered field map.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupValue {
    pub type_name: String,
    /// The group's wire id, once resolved against a schema. `None` for a
    /// freshly built value the caller hasn't encoded or decoded yet;
    /// populated on decode from the instructions that produced it.
    pub group_id: Option<u64>,
    pub fields: IndexMap<String, Option<Value>>,
}

impl GroupValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            group_id: None,
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Option<Value>>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(|v| v.as_ref())
    }
}
