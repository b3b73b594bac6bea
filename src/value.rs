//! Typed values that the writer encodes
//!
//! `Value` is a closed tagged union over every kind of value the stream
//! protocol can carry. Reference kinds (arrays, enum constants, class
//! objects, descriptors, object instances) are held behind `Rc` so the
//! handle table can recognize a shared value by identity when it comes
//! around a second time.

use crate::descriptor::{ClassDescriptor, FieldKind};
use crate::error::ObjStreamError;
use crate::sink::Sink;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A value that can be written to the stream
#[derive(Debug, Clone)]
pub enum Value {
    /// Null reference
    Null,
    /// Boolean value
    Boolean(bool),
    /// Signed 8-bit integer
    Byte(i8),
    /// Signed 16-bit integer
    Short(i16),
    /// UTF-16 code unit
    Char(u16),
    /// Signed 32-bit integer
    Int(i32),
    /// Signed 64-bit integer
    Long(i64),
    /// 32-bit float, declared but never encodable
    Float(f32),
    /// 64-bit float, declared but never encodable
    Double(f64),
    /// String value
    String(String),
    /// Homogeneous array
    Array(Rc<ArrayValue>),
    /// Enum constant
    Enum(Rc<EnumValue>),
    /// Class object
    Class(Rc<ClassValue>),
    /// Class descriptor written as a value
    ClassDesc(Rc<ClassDescriptor>),
    /// Ordinary object instance
    Object(Rc<ObjectValue>),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create a long from two big-endian 32-bit halves, high half first
    pub fn long_from_halves(high: u32, low: u32) -> Self {
        Value::Long(((high as i64) << 32) | low as i64)
    }

    /// The one-character wire type code, if this kind has one
    pub fn type_code(&self) -> Option<u8> {
        match self {
            Value::Boolean(_) => Some(b'Z'),
            Value::Byte(_) => Some(b'B'),
            Value::Short(_) => Some(b'S'),
            Value::Char(_) => Some(b'C'),
            Value::Int(_) => Some(b'I'),
            Value::Long(_) => Some(b'J'),
            Value::Float(_) => Some(b'F'),
            Value::Double(_) => Some(b'D'),
            Value::Array(_) => Some(b'['),
            Value::Object(_) => Some(b'L'),
            _ => None,
        }
    }

    /// Whether this value is written as raw field data rather than a record
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Boolean(_)
                | Value::Byte(_)
                | Value::Short(_)
                | Value::Char(_)
                | Value::Int(_)
                | Value::Long(_)
                | Value::Float(_)
                | Value::Double(_)
        )
    }

    /// Encode a primitive value as big-endian bytes
    ///
    /// Float and double are declared by the protocol but deliberately
    /// unimplemented here; they fail without writing anything.
    pub fn encode_primitive<S: Sink>(&self, out: &mut S) -> Result<(), ObjStreamError> {
        match self {
            Value::Boolean(v) => {
                out.write_byte(if *v { 1 } else { 0 });
                Ok(())
            }
            Value::Byte(v) => {
                out.write_byte(*v as u8);
                Ok(())
            }
            Value::Short(v) => {
                out.write_bytes(&v.to_be_bytes());
                Ok(())
            }
            Value::Char(v) => {
                out.write_bytes(&v.to_be_bytes());
                Ok(())
            }
            Value::Int(v) => {
                out.write_bytes(&v.to_be_bytes());
                Ok(())
            }
            Value::Long(v) => {
                out.write_bytes(&v.to_be_bytes());
                Ok(())
            }
            Value::Float(_) => Err(ObjStreamError::Unsupported(
                "float encoding is not implemented".to_string(),
            )),
            Value::Double(_) => Err(ObjStreamError::Unsupported(
                "double encoding is not implemented".to_string(),
            )),
            _ => Err(ObjStreamError::SchemaMismatch(
                "value is not a primitive".to_string(),
            )),
        }
    }
}

/// A homogeneous array with its class descriptor and element type
#[derive(Debug, Clone)]
pub struct ArrayValue {
    /// Descriptor of the array class itself, e.g. `[I`
    pub descriptor: Rc<ClassDescriptor>,
    /// Element type; primitive kinds use the fixed-width array encoding
    pub element_kind: FieldKind,
    /// Elements in order
    pub elements: Vec<Value>,
}

impl ArrayValue {
    /// Create an array value
    pub fn new(
        descriptor: Rc<ClassDescriptor>,
        element_kind: FieldKind,
        elements: Vec<Value>,
    ) -> Self {
        Self {
            descriptor,
            element_kind,
            elements,
        }
    }
}

/// An enum constant with the descriptor of its enum type
#[derive(Debug, Clone)]
pub struct EnumValue {
    /// Descriptor of the constant's class
    pub descriptor: Rc<ClassDescriptor>,
    /// Name of the constant
    pub constant_name: String,
}

impl EnumValue {
    /// Create an enum constant value
    pub fn new(descriptor: Rc<ClassDescriptor>, constant_name: impl Into<String>) -> Self {
        Self {
            descriptor,
            constant_name: constant_name.into(),
        }
    }
}

/// A class object, carrying its caller-supplied descriptor
#[derive(Debug, Clone)]
pub struct ClassValue {
    /// Descriptor of the referenced class
    pub descriptor: Rc<ClassDescriptor>,
}

impl ClassValue {
    /// Create a class value
    pub fn new(descriptor: Rc<ClassDescriptor>) -> Self {
        Self { descriptor }
    }
}

/// An object instance: a descriptor plus named field values
///
/// Fields absent from the map fall back to the protocol's zero defaults
/// for primitives and to null for object fields. Field values sit behind
/// a `RefCell` so a graph can be closed into a cycle after the instance
/// is shared (`set_field` on an already-`Rc`'d node); the writer encodes
/// such cycles through back-references.
#[derive(Debug, Clone)]
pub struct ObjectValue {
    /// Declared class descriptor; `None` is a fatal mismatch at write time
    pub descriptor: Option<Rc<ClassDescriptor>>,
    /// Field name to value
    pub field_values: RefCell<HashMap<String, Value>>,
}

impl ObjectValue {
    /// Create an instance of the given class with no fields set
    pub fn new(descriptor: Rc<ClassDescriptor>) -> Self {
        Self {
            descriptor: Some(descriptor),
            field_values: RefCell::new(HashMap::new()),
        }
    }

    /// Set a field value, chainable for building graphs
    pub fn field(self, name: impl Into<String>, value: Value) -> Self {
        self.field_values.borrow_mut().insert(name.into(), value);
        self
    }

    /// Set a field value on a shared instance; this is how a graph is
    /// made cyclic
    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.field_values.borrow_mut().insert(name.into(), value);
    }

    /// Fetch a field value
    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.field_values.borrow().get(name).cloned()
    }
}
