//! # objstream
//!
//! A writer for the binary wire format of the Java Object Serialization
//! Stream protocol.
//!
//! The caller builds a typed value graph ([`Value`]) with explicit class
//! schemas ([`ClassDescriptor`]) and hands it to an [`ObjectWriter`],
//! which emits a byte stream a conforming reader reconstructs into
//! equivalent values: primitives, arrays, strings, enum constants, and
//! nested or cyclic object graphs resolved through back-reference
//! handles.
//!
//! Encoding only; there is no reader in this crate. Float/double values
//! and non-ASCII strings are declared by the protocol but deliberately
//! unimplemented: writing one fails loudly instead of emitting wrong
//! bytes.
//!
//! ## Example
//!
//! ```rust
//! use objstream::{ClassDescriptor, FieldDescriptor, ObjectValue, ObjectWriter, PrimitiveType, Value};
//! use std::rc::Rc;
//!
//! let point = Rc::new(ClassDescriptor::new(
//!     "Point",
//!     1,
//!     vec![
//!         FieldDescriptor::primitive("x", PrimitiveType::Int),
//!         FieldDescriptor::primitive("y", PrimitiveType::Int),
//!     ],
//! ));
//!
//! let value = Value::Object(Rc::new(
//!     ObjectValue::new(point).field("x", Value::Int(3)).field("y", Value::Int(4)),
//! ));
//!
//! let mut out = ObjectWriter::new();
//! out.write_header();
//! out.write_value(&value).unwrap();
//! let bytes = out.into_bytes();
//! assert_eq!(&bytes[..4], &[0xAC, 0xED, 0x00, 0x05]);
//! ```

mod descriptor;
mod error;
mod handles;
mod sink;
mod type_codes;
mod value;
mod writer;

pub use descriptor::{
    ClassDescriptor, FieldDescriptor, FieldKind, PrimitiveType, ProtocolVersion,
    WriteExternalHook, WriteObjectHook, SC_BLOCK_DATA, SC_ENUM, SC_EXTERNALIZABLE,
    SC_SERIALIZABLE, SC_WRITE_METHOD,
};
pub use error::ObjStreamError;
pub use sink::{DataOutput, Sink};
pub use type_codes::{TypeCode, BASE_WIRE_HANDLE, STREAM_MAGIC, STREAM_VERSION};
pub use value::{ArrayValue, ClassValue, EnumValue, ObjectValue, Value};
pub use writer::{write_stream, AnnotateHook, ObjectWriter};
