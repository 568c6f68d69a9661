//! The schema model: the read-only input consumed by the field codec
//! compiler and the group dispatcher. A [`Schema`] is built once (directly
//! or via [`builder::SchemaBuilder`]) and never mutated after.

pub mod builder;

use indexmap::IndexMap;

/// A named, ordered list of `(symbol, value)` pairs backing an `Enum` type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSymbol {
    pub name: String,
    pub value: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEpoch {
    UnixEpoch,
    MidnightEpoch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZone {
    Utc,
    Local,
}

/// A field's type, as a tagged variant rather than a class hierarchy so the
/// field codec compiler's match over type shape (see `compiler`) is
/// exhaustive and machine-checked.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDef {
    Int { width: u8, signed: bool },
    Float32,
    Float64,
    Decimal,
    BigInt,
    BigDecimal,
    Boolean,
    String { max_size: Option<u32> },
    Binary { max_size: Option<u32> },
    Time {
        unit: TimeUnit,
        epoch: TimeEpoch,
        zone: TimeZone,
    },
    Enum { symbols: Vec<EnumSymbol> },
    Sequence { component: Box<TypeDef> },
    /// Static group reference: on the wire the referenced group is inlined.
    Reference { group_name: String },
    /// Polymorphic group reference: `group_name = None` means "any group in
    /// the schema", otherwise the reference is over `group_name` and every
    /// group transitively declaring it as a super-group.
    DynamicReference { group_name: Option<String> },
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub id: Option<u64>,
    pub type_def: TypeDef,
    pub required: bool,
    pub annotations: IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct GroupDef {
    pub name: String,
    pub id: Option<u64>,
    pub super_group: Option<String>,
    pub fields: Vec<FieldDef>,
    pub annotations: IndexMap<String, String>,
}

/// The bound input schema: an ordered set of [`GroupDef`]s, unique by name
/// and (when present) by id.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    groups: IndexMap<String, GroupDef>,
}

impl Schema {
    pub fn new(groups: impl IntoIterator<Item = GroupDef>) -> Self {
        Self {
            groups: groups.into_iter().map(|g| (g.name.clone(), g)).collect(),
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupDef> {
        self.groups.values()
    }

    /// 4.C: read-only projection used by both compile and dispatch paths.
    pub fn groups_by_name(&self, name: &str) -> Option<&GroupDef> {
        self.groups.get(name)
    }

    pub fn group_by_id(&self, id: u64) -> Option<&GroupDef> {
        self.groups.values().find(|g| g.id == Some(id))
    }

    /// `root` itself plus every group transitively declaring `root` (by
    /// name) as its super-group, in schema declaration order.
    pub fn dynamic_subgroups<'a>(&'a self, root: &'a str) -> impl Iterator<Item = &'a GroupDef> {
        self.groups.values().filter(move |g| {
            g.name == root || self.is_descendant_of(g, root)
        })
    }

    fn is_descendant_of(&self, group: &GroupDef, ancestor: &str) -> bool {
        let mut current = group.super_group.as_deref();
        let mut guard = 0usize;
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            guard += 1;
            if guard > self.groups.len() {
                // cycle; the compiler rejects this schema outright, but
                // don't spin forever while it's still being inspected.
                return false;
            }
            current = self.groups.get(name).and_then(|g| g.super_group.as_deref());
        }
        false
    }

    /// Flattens alias-like references; Blink's `TypeDef` has no separate
    /// alias shape, so this currently only recurses into `Sequence`
    /// components when `follow_refs` is requested, returning the type
    /// unchanged otherwise.
    pub fn resolve_to_type<'a>(&'a self, type_def: &'a TypeDef, follow_refs: bool) -> &'a TypeDef {
        match type_def {
            TypeDef::Sequence { component } if follow_refs => self.resolve_to_type(component, follow_refs),
            other => other,
        }
    }

    pub fn resolve_to_group(&self, type_def: &TypeDef) -> Option<&GroupDef> {
        match type_def {
            TypeDef::Reference { group_name } => self.groups_by_name(group_name),
            TypeDef::DynamicReference {
                group_name: Some(group_name),
            } => self.groups_by_name(group_name),
            _ => None,
        }
    }
}
