//! 4.D: turns a bound [`Schema`] into one [`GroupInstructions`] per group,
//! with inheritance flattened to a single field list at compile time — the
//! runtime never walks parents.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::CodecOptions;
use crate::result::SchemaError;
use crate::schema::{EnumSymbol, FieldDef, GroupDef, Schema, TimeEpoch, TimeUnit, TimeZone, TypeDef};

#[derive(Debug, Clone)]
pub enum PrimitiveType {
    Int { width: u8, signed: bool },
    Float32,
    Float64,
    Decimal,
    BigInt,
    BigDecimal,
    Boolean,
    String,
    Binary,
    Time {
        unit: TimeUnit,
        epoch: TimeEpoch,
        zone: TimeZone,
    },
}

/// The set of group ids/names a dynamic reference field may resolve to on
/// the wire, precomputed from [`Schema::dynamic_subgroups`].
#[derive(Debug, Clone)]
pub struct DynamicGroupTarget {
    pub root: Option<String>,
    pub valid_ids: HashSet<u64>,
    pub valid_names: HashSet<String>,
}

impl DynamicGroupTarget {
    pub fn permits_name(&self, name: &str) -> bool {
        self.valid_names.contains(name)
    }

    pub fn permits_id(&self, id: u64) -> bool {
        self.valid_ids.contains(&id)
    }
}

#[derive(Debug, Clone)]
pub enum ValueCodec {
    Primitive(PrimitiveType),
    Enum(Vec<EnumSymbol>),
    /// Static group reference, naming the target group; resolved against
    /// the dispatcher at encode/decode time rather than embedded directly,
    /// which sidesteps having to build cyclic `Arc` graphs for
    /// self-referential groups.
    StaticGroup(String),
    DynamicGroup(DynamicGroupTarget),
    SequenceOfPrimitive(PrimitiveType),
    /// Inner codec is always `StaticGroup` or `DynamicGroup`.
    SequenceOfGroup(Box<ValueCodec>),
}

#[derive(Debug, Clone)]
pub struct FieldInstruction {
    pub name: String,
    pub codec: ValueCodec,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct GroupInstructions {
    pub group_name: String,
    pub group_id: Option<u64>,
    pub fields: Vec<FieldInstruction>,
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics(Vec<String>);

impl Diagnostics {
    fn push(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!("{msg}");
        self.0.push(msg);
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn flatten_fields<'a>(
    schema: &'a Schema,
    group: &'a GroupDef,
) -> Result<Vec<&'a FieldDef>, SchemaError> {
    let mut chain = vec![group];
    let mut seen = HashSet::new();
    seen.insert(group.name.as_str());
    let mut current = group;
    while let Some(super_name) = &current.super_group {
        let parent = schema
            .groups_by_name(super_name)
            .ok_or_else(|| SchemaError::UnresolvedSuperGroup {
                group: current.name.clone(),
                super_group: super_name.clone(),
            })?;
        if !seen.insert(parent.name.as_str()) {
            return Err(SchemaError::InheritanceCycle(group.name.clone()));
        }
        chain.push(parent);
        current = parent;
    }
    chain.reverse();
    Ok(chain.into_iter().flat_map(|g| g.fields.iter()).collect())
}

fn compile_primitive(type_def: &TypeDef) -> Option<PrimitiveType> {
    match type_def {
        TypeDef::Int { width, signed } => Some(PrimitiveType::Int {
            width: *width,
            signed: *signed,
        }),
        TypeDef::Float32 => Some(PrimitiveType::Float32),
        TypeDef::Float64 => Some(PrimitiveType::Float64),
        TypeDef::Decimal => Some(PrimitiveType::Decimal),
        TypeDef::BigInt => Some(PrimitiveType::BigInt),
        TypeDef::BigDecimal => Some(PrimitiveType::BigDecimal),
        TypeDef::Boolean => Some(PrimitiveType::Boolean),
        TypeDef::String { .. } => Some(PrimitiveType::String),
        TypeDef::Binary { .. } => Some(PrimitiveType::Binary),
        TypeDef::Time { unit, epoch, zone } => Some(PrimitiveType::Time {
            unit: *unit,
            epoch: *epoch,
            zone: *zone,
        }),
        _ => None,
    }
}

fn dynamic_target(schema: &Schema, root: &Option<String>) -> DynamicGroupTarget {
    let groups: Vec<&GroupDef> = match root {
        Some(name) => schema.dynamic_subgroups(name).collect(),
        None => schema.groups().collect(),
    };
    let valid_names = groups.iter().map(|g| g.name.clone()).collect();
    let valid_ids = groups.iter().filter_map(|g| g.id).collect();
    DynamicGroupTarget {
        root: root.clone(),
        valid_ids,
        valid_names,
    }
}

fn compile_type(
    schema: &Schema,
    group_name: &str,
    field_name: &str,
    type_def: &TypeDef,
) -> Result<ValueCodec, SchemaError> {
    if let Some(prim) = compile_primitive(type_def) {
        return Ok(ValueCodec::Primitive(prim));
    }
    match type_def {
        TypeDef::Enum { symbols } => Ok(ValueCodec::Enum(symbols.clone())),
        TypeDef::Reference { group_name: target } => {
            if schema.resolve_to_group(type_def).is_none() {
                return Err(SchemaError::InvalidGroupReference {
                    group: group_name.to_string(),
                    field: field_name.to_string(),
                });
            }
            Ok(ValueCodec::StaticGroup(target.clone()))
        }
        TypeDef::DynamicReference { group_name: root } => {
            if root.is_some() && schema.resolve_to_group(type_def).is_none() {
                return Err(SchemaError::InvalidGroupReference {
                    group: group_name.to_string(),
                    field: field_name.to_string(),
                });
            }
            let target = dynamic_target(schema, root);
            for name in &target.valid_names {
                let g = schema.groups_by_name(name).expect("collected from schema");
                if g.id.is_none() {
                    return Err(SchemaError::DynamicTargetMissingId(g.name.clone()));
                }
            }
            Ok(ValueCodec::DynamicGroup(target))
        }
        TypeDef::Sequence { component } => {
            if matches!(component.as_ref(), TypeDef::Binary { .. }) {
                return Err(SchemaError::SequenceOfBinary {
                    group: group_name.to_string(),
                    field: field_name.to_string(),
                });
            }
            if let Some(prim) = compile_primitive(component) {
                return Ok(ValueCodec::SequenceOfPrimitive(prim));
            }
            match component.as_ref() {
                TypeDef::Reference { .. } | TypeDef::DynamicReference { .. } => {
                    let inner = compile_type(schema, group_name, field_name, component)?;
                    Ok(ValueCodec::SequenceOfGroup(Box::new(inner)))
                }
                _ => Err(SchemaError::InvalidGroupReference {
                    group: group_name.to_string(),
                    field: field_name.to_string(),
                }),
            }
        }
        TypeDef::Int { .. }
        | TypeDef::Float32
        | TypeDef::Float64
        | TypeDef::Decimal
        | TypeDef::BigInt
        | TypeDef::BigDecimal
        | TypeDef::Boolean
        | TypeDef::String { .. }
        | TypeDef::Binary { .. }
        | TypeDef::Time { .. } => unreachable!("handled by compile_primitive above"),
    }
}

#[tracing::instrument(skip(schema, options))]
pub fn compile(
    schema: &Schema,
    options: &CodecOptions,
) -> Result<(IndexMap<String, Arc<GroupInstructions>>, Diagnostics), SchemaError> {
    let _ = options;
    let mut diagnostics = Diagnostics::default();
    let mut compiled = IndexMap::new();

    for group in schema.groups() {
        let flattened = flatten_fields(schema, group)?;

        let mut seen_ids = HashSet::new();
        for field in &flattened {
            if let Some(id) = field.id {
                if !seen_ids.insert(id) {
                    return Err(SchemaError::DuplicateFieldId {
                        group: group.name.clone(),
                        id,
                    });
                }
            }
        }

        let mut fields = Vec::with_capacity(flattened.len());
        for field in flattened {
            let codec = compile_type(schema, &group.name, &field.name, &field.type_def)?;
            fields.push(FieldInstruction {
                name: field.name.clone(),
                codec,
                required: field.required,
            });
        }

        if group.super_group.is_none()
            && schema
                .groups()
                .any(|g| g.super_group.as_deref() == Some(group.name.as_str()))
            && group.id.is_none()
        {
            diagnostics.push(format!(
                "group '{}' has subgroups but declares no id; it can never be chosen via a dynamic reference",
                group.name
            ));
        }

        tracing::debug!(group = %group.name, fields = fields.len(), "compiled group instructions");

        compiled.insert(
            group.name.clone(),
            Arc::new(GroupInstructions {
                group_name: group.name.clone(),
                group_id: group.id,
                fields,
            }),
        );
    }

    Ok((compiled, diagnostics))
}
