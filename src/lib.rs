//! A compact binary wire codec driven entirely by a runtime [`Schema`]:
//! compile a schema once into dispatch-ready instructions, then encode and
//! decode self-delimiting frames against it without any generated code or
//! reflection over host types.
//!
//! ```text
//! Schema --(compiler)--> GroupInstructions --(dispatch)--> Codec::encode/decode
//! ```

pub mod buffer;
pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod framing;
pub mod primitives;
pub mod result;
pub mod schema;
pub mod value;

pub use config::{CodecOptions, FrameSizeWidth};
pub use framing::Codec;
pub use result::{DecodingError, EncodingError, Error, Result, SchemaError};
pub use schema::builder::{types, SchemaBuilder};
pub use schema::{EnumSymbol, FieldDef, GroupDef, Schema, TimeEpoch, TimeUnit, TimeZone, TypeDef};
pub use value::{GroupValue, Value};
