//! Programmatic schema construction. This is the in-scope counterpart to
//! host-language reflective schema derivation (explicitly out of scope):
//! plain data, built up with a fluent builder, the way [`crate::schema`]'s
//! teacher builds up a PDB file with `PdbBuilder`.

use indexmap::IndexMap;

use super::{EnumSymbol, FieldDef, GroupDef, Schema, TimeEpoch, TimeUnit, TimeZone, TypeDef};

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    groups: Vec<GroupDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, name: impl Into<String>) -> GroupBuilder {
        GroupBuilder {
            schema: self.take(),
            def: GroupDef {
                name: name.into(),
                id: None,
                super_group: None,
                fields: Vec::new(),
                annotations: IndexMap::new(),
            },
        }
    }

    fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn build(self) -> Schema {
        Schema::new(self.groups)
    }
}

/// Builds one [`GroupDef`] and hands control back to the owning
/// [`SchemaBuilder`] on [`GroupBuilder::end_group`].
pub struct GroupBuilder {
    schema: SchemaBuilder,
    def: GroupDef,
}

impl GroupBuilder {
    pub fn id(mut self, id: u64) -> Self {
        self.def.id = Some(id);
        self
    }

    pub fn super_group(mut self, name: impl Into<String>) -> Self {
        self.def.super_group = Some(name.into());
        self
    }

    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.def.annotations.insert(key.into(), value.into());
        self
    }

    pub fn field(self, name: impl Into<String>, type_def: TypeDef) -> FieldBuilder {
        FieldBuilder {
            group: self,
            def: FieldDef {
                name: name.into(),
                id: None,
                type_def,
                required: false,
                annotations: IndexMap::new(),
            },
        }
    }

    pub fn end_group(mut self) -> SchemaBuilder {
        self.schema.groups.push(self.def);
        self.schema
    }
}

pub struct FieldBuilder {
    group: GroupBuilder,
    def: FieldDef,
}

impl FieldBuilder {
    pub fn id(mut self, id: u64) -> Self {
        self.def.id = Some(id);
        self
    }

    pub fn required(mut self) -> Self {
        self.def.required = true;
        self
    }

    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.def.annotations.insert(key.into(), value.into());
        self
    }

    pub fn end_field(mut self) -> GroupBuilder {
        self.group.def.fields.push(self.def);
        self.group
    }
}

/// Convenience constructors for the primitive `TypeDef` shapes, mirroring
/// the enum-value helpers in `codecs.rs` in spirit: small free functions
/// rather than a dozen inherent constructors on `TypeDef`.
pub mod types {
    use super::TypeDef;

    pub fn int(width: u8, signed: bool) -> TypeDef {
        TypeDef::Int { width, signed }
    }

    pub fn string() -> TypeDef {
        TypeDef::String { max_size: None }
    }

    pub fn binary() -> TypeDef {
        TypeDef::Binary { max_size: None }
    }

    pub fn time(unit: super::TimeUnit, epoch: super::TimeEpoch, zone: super::TimeZone) -> TypeDef {
        TypeDef::Time { unit, epoch, zone }
    }

    pub fn enum_of(symbols: impl IntoIterator<Item = (&'static str, i32)>) -> TypeDef {
        TypeDef::Enum {
            symbols: symbols
                .into_iter()
                .map(|(name, value)| super::EnumSymbol {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        }
    }

    pub fn sequence(component: TypeDef) -> TypeDef {
        TypeDef::Sequence {
            component: Box::new(component),
        }
    }

    pub fn reference(group_name: impl Into<String>) -> TypeDef {
        TypeDef::Reference {
            group_name: group_name.into(),
        }
    }

    pub fn dynamic_reference(group_name: Option<&str>) -> TypeDef {
        TypeDef::DynamicReference {
            group_name: group_name.map(str::to_string),
        }
    }
}
