use thiserror::Error;

pub type Result<A, E = Error> = std::result::Result<A, E>;

/// Errors raised while compiling a [`crate::schema::Schema`] into
/// dispatch-ready instructions. Fatal: a schema that fails to compile
/// never produces a usable [`crate::Codec`].
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("duplicate field id {id} in group '{group}'")]
    DuplicateFieldId { group: String, id: u64 },
    #[error("group '{0}' not found")]
    UnknownGroup(String),
    #[error("field '{field}' in group '{group}' references unknown type")]
    UnresolvedTypeReference { group: String, field: String },
    #[error("group '{group}' declares unresolved super-group '{super_group}'")]
    UnresolvedSuperGroup { group: String, super_group: String },
    #[error("inheritance cycle detected at group '{0}'")]
    InheritanceCycle(String),
    #[error("group '{0}' is used as a dynamic reference target but has no id")]
    DynamicTargetMissingId(String),
    #[error("field '{field}' in group '{group}' is a reference without a valid target group")]
    InvalidGroupReference { group: String, field: String },
    #[error("field '{field}' in group '{group}' is a sequence of binary, which is unsupported")]
    SequenceOfBinary { group: String, field: String },
}

/// Errors raised while encoding a value against compiled instructions.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("no group instructions registered for host type '{0}'")]
    UnknownGroupType(String),
    #[error("dynamic group '{actual}' is not a permitted subgroup of '{root}'")]
    DynamicGroupTypeNotPermitted { root: String, actual: String },
    #[error("encoded frame size {size} does not fit in the reserved {width}-byte slot")]
    FrameTooLarge { size: usize, width: usize },
    #[error("value {value} is out of range for a {width}-bit {signed} integer")]
    ValueOutOfRange {
        value: i128,
        width: u32,
        signed: &'static str,
    },
    #[error("field '{0}' is required but no value was supplied")]
    MissingRequiredField(String),
    #[error("field '{0}' value does not match its declared type")]
    TypeMismatch(String),
}

/// Errors raised while decoding a frame against compiled instructions.
#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("buffer exhausted while decoding a primitive")]
    Truncated,
    #[error("frame declared {declared} bytes of group id {group_id} but payload used {used}")]
    FrameOverrun {
        group_id: u64,
        declared: usize,
        used: usize,
    },
    #[error("no group instructions registered for group id {0}")]
    UnknownGroupId(u64),
    #[error("decoded dynamic group id {group_id} is not a permitted subgroup of '{root}'")]
    DynamicGroupTypeNotPermitted { root: String, group_id: u64 },
    #[error("invalid VLC header byte 0x{0:02x}")]
    InvalidVlcHeader(u8),
    #[error("invalid utf-8 in string field")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("{value} is not a valid value of enum '{enum_name}'")]
    InvalidEnumValue { enum_name: String, value: i32 },
    #[error("required field '{0}' decoded as null")]
    MissingRequiredField(String),
    #[error("declared width {declared} exceeds destination type width {max}")]
    Overflow { declared: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
