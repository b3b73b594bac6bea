//! Class descriptors: the serialized shape of a class
//!
//! A descriptor is supplied by the caller in full (the protocol's class
//! metadata is never derived from a live type system here) and is
//! immutable once handed to the writer. Super-class links are `Rc`
//! references built bottom-up, so a descriptor chain cannot form a cycle.

use crate::error::ObjStreamError;
use crate::sink::{DataOutput, Sink};
use crate::value::{ObjectValue, Value};
use crate::writer::ObjectWriter;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Flag bit: the class declares a custom writeObject hook
pub const SC_WRITE_METHOD: u8 = 0x01;
/// Flag bit: the class is serializable
pub const SC_SERIALIZABLE: u8 = 0x02;
/// Flag bit: the class is externalizable
pub const SC_EXTERNALIZABLE: u8 = 0x04;
/// Flag bit: externalizable data is written in block-data form
pub const SC_BLOCK_DATA: u8 = 0x08;
/// Flag bit: the class is an enum type
pub const SC_ENUM: u8 = 0x10;

/// Negotiated stream protocol version
///
/// Version 2 is the default; it wraps externalizable data in block-data
/// framing so a reader can skip it without the class being present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V1,
    V2,
}

/// Hook invoked in place of default field data for a class that declares
/// a custom writeObject; runs with block mode enabled and receives the
/// slot descriptor being written
pub type WriteObjectHook =
    Rc<dyn Fn(&mut ObjectWriter, &ObjectValue, &ClassDescriptor) -> Result<(), ObjStreamError>>;

/// Hook that writes an externalizable object's data
pub type WriteExternalHook =
    Rc<dyn Fn(&mut ObjectWriter, &ObjectValue) -> Result<(), ObjStreamError>>;

/// The primitive field types of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
}

impl PrimitiveType {
    /// The one-character wire type code
    pub fn type_code(self) -> u8 {
        match self {
            PrimitiveType::Boolean => b'Z',
            PrimitiveType::Byte => b'B',
            PrimitiveType::Char => b'C',
            PrimitiveType::Double => b'D',
            PrimitiveType::Float => b'F',
            PrimitiveType::Int => b'I',
            PrimitiveType::Long => b'J',
            PrimitiveType::Short => b'S',
        }
    }

    /// Convert from a wire type code
    pub fn from_type_code(code: u8) -> Option<Self> {
        match code {
            b'Z' => Some(PrimitiveType::Boolean),
            b'B' => Some(PrimitiveType::Byte),
            b'C' => Some(PrimitiveType::Char),
            b'D' => Some(PrimitiveType::Double),
            b'F' => Some(PrimitiveType::Float),
            b'I' => Some(PrimitiveType::Int),
            b'J' => Some(PrimitiveType::Long),
            b'S' => Some(PrimitiveType::Short),
            _ => None,
        }
    }

    /// Protocol zero default for an unset field, if one is defined
    ///
    /// Float and double have no default because their encoding is
    /// unimplemented; an absent value for either is a fatal error.
    pub(crate) fn default_value(self) -> Option<Value> {
        match self {
            PrimitiveType::Boolean => Some(Value::Boolean(false)),
            PrimitiveType::Byte => Some(Value::Byte(0)),
            PrimitiveType::Char => Some(Value::Char(0)),
            PrimitiveType::Int => Some(Value::Int(0)),
            PrimitiveType::Long => Some(Value::Long(0)),
            PrimitiveType::Short => Some(Value::Short(0)),
            PrimitiveType::Double | PrimitiveType::Float => None,
        }
    }
}

/// The type of one field slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A primitive field, identified by its type code
    Primitive(PrimitiveType),
    /// An object field, identified by its type string, e.g. `Ljava/lang/String;`
    Object(String),
}

/// One slot of a class's serialized layout
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Field type
    pub kind: FieldKind,
    /// Whether values of this field are always written unshared
    pub unshared: bool,
}

impl FieldDescriptor {
    /// Declare a primitive field
    pub fn primitive(name: impl Into<String>, ty: PrimitiveType) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Primitive(ty),
            unshared: false,
        }
    }

    /// Declare an object field with its type string
    pub fn object(name: impl Into<String>, type_string: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Object(type_string.into()),
            unshared: false,
        }
    }

    /// Mark the field unshared: its values never enter the handle table
    pub fn unshared(mut self) -> Self {
        self.unshared = true;
        self
    }

    /// The type-code byte written in the descriptor body
    pub(crate) fn wire_type_code(&self) -> Result<u8, ObjStreamError> {
        match &self.kind {
            FieldKind::Primitive(ty) => Ok(ty.type_code()),
            FieldKind::Object(type_string) => {
                type_string.as_bytes().first().copied().ok_or_else(|| {
                    ObjStreamError::SchemaMismatch(format!(
                        "empty type string for field {}",
                        self.name
                    ))
                })
            }
        }
    }
}

/// The serialized schema of one class: name, version id, flags, field
/// layout, and an optional parent descriptor
#[derive(Clone)]
pub struct ClassDescriptor {
    /// Fully qualified class name
    pub class_name: String,
    /// 64-bit serial version UID
    pub serial_version_uid: i64,
    /// Declared fields, order fixed at construction
    pub fields: Vec<FieldDescriptor>,
    /// Parent descriptor; `None` at the root of the chain
    pub super_descriptor: Option<Rc<ClassDescriptor>>,
    /// Whether this describes a dynamic proxy class
    pub is_proxy: bool,
    /// Whether this describes an enum type
    pub is_enum: bool,
    /// Whether the class declares a custom writeObject
    pub has_write_object: bool,
    /// Whether the class is externalizable
    pub has_write_external: bool,
    /// Interface names, proxy descriptors only
    pub proxy_interfaces: Vec<String>,
    /// Custom per-slot data writer, runs when `has_write_object` is set
    pub write_object_hook: Option<WriteObjectHook>,
    /// Externalizable data writer
    pub write_external_hook: Option<WriteExternalHook>,
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("class_name", &self.class_name)
            .field("serial_version_uid", &self.serial_version_uid)
            .field("fields", &self.fields)
            .field("super_descriptor", &self.super_descriptor)
            .field("is_proxy", &self.is_proxy)
            .field("is_enum", &self.is_enum)
            .field("has_write_object", &self.has_write_object)
            .field("has_write_external", &self.has_write_external)
            .field("proxy_interfaces", &self.proxy_interfaces)
            .finish()
    }
}

impl ClassDescriptor {
    /// Describe an ordinary serializable class
    pub fn new(
        class_name: impl Into<String>,
        serial_version_uid: i64,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            serial_version_uid,
            fields,
            super_descriptor: None,
            is_proxy: false,
            is_enum: false,
            has_write_object: false,
            has_write_external: false,
            proxy_interfaces: Vec::new(),
            write_object_hook: None,
            write_external_hook: None,
        }
    }

    /// Describe an enum type: no fields, serial version UID zero
    pub fn for_enum(class_name: impl Into<String>) -> Self {
        let mut desc = Self::new(class_name, 0, Vec::new());
        desc.is_enum = true;
        desc
    }

    /// Describe a dynamic proxy class implementing the given interfaces
    pub fn proxy(interfaces: Vec<String>) -> Self {
        let mut desc = Self::new("", 0, Vec::new());
        desc.is_proxy = true;
        desc.proxy_interfaces = interfaces;
        desc
    }

    /// Link the parent descriptor
    pub fn with_super(mut self, super_descriptor: Rc<ClassDescriptor>) -> Self {
        self.super_descriptor = Some(super_descriptor);
        self
    }

    /// Declare a custom writeObject hook for this class's slot
    pub fn with_write_object(mut self, hook: WriteObjectHook) -> Self {
        self.has_write_object = true;
        self.write_object_hook = Some(hook);
        self
    }

    /// Mark the class externalizable with a data-writing hook
    pub fn with_write_external(mut self, hook: WriteExternalHook) -> Self {
        self.has_write_external = true;
        self.write_external_hook = Some(hook);
        self
    }

    /// Mark the class externalizable with no hook; under protocol 2 this
    /// writes an empty block-data region
    pub fn externalizable(mut self) -> Self {
        self.has_write_external = true;
        self
    }

    /// The descriptor flag byte for the given protocol version
    pub fn flags(&self, protocol: ProtocolVersion) -> u8 {
        let mut flags = 0;
        if self.has_write_external {
            flags |= SC_EXTERNALIZABLE;
            if protocol != ProtocolVersion::V1 {
                flags |= SC_BLOCK_DATA;
            }
        } else {
            flags |= SC_SERIALIZABLE;
        }
        if self.has_write_object {
            flags |= SC_WRITE_METHOD;
        }
        if self.is_enum {
            flags |= SC_ENUM;
        }
        flags
    }

    /// The full class data layout: descriptors from the root ancestor
    /// down to this class, one per slot of instance data
    ///
    /// Walks the chain iteratively to keep stack depth flat.
    pub fn class_data_layout(self: &Rc<Self>) -> Vec<Rc<ClassDescriptor>> {
        let mut chain = Vec::new();
        let mut cursor = Some(Rc::clone(self));
        while let Some(desc) = cursor {
            cursor = desc.super_descriptor.clone();
            chain.push(desc);
        }
        chain.reverse();
        chain
    }

    /// The object-typed fields of this class, in declared order
    pub fn object_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Object(_)))
    }

    /// Serialize this slot's primitive fields in declared order
    ///
    /// Buffers into a scratch output first so the caller's sink sees one
    /// contiguous write. Absent values take the protocol zero default; a
    /// present value whose type code disagrees with the field is fatal.
    pub(crate) fn write_primitive_fields<S: Sink>(
        &self,
        values: &HashMap<String, Value>,
        out: &mut S,
    ) -> Result<(), ObjStreamError> {
        let mut buf = DataOutput::new();
        for field in &self.fields {
            let ty = match &field.kind {
                FieldKind::Primitive(ty) => *ty,
                FieldKind::Object(_) => continue,
            };
            match values.get(&field.name) {
                Some(value) => {
                    if value.type_code() != Some(ty.type_code()) {
                        return Err(ObjStreamError::SchemaMismatch(format!(
                            "field {} of {} expects type code {}, got {:?}",
                            field.name, self.class_name, ty.type_code() as char, value
                        )));
                    }
                    value.encode_primitive(&mut buf)?;
                }
                None => {
                    let default = ty.default_value().ok_or_else(|| {
                        ObjStreamError::SchemaMismatch(format!(
                            "missing value for field {} of {}",
                            field.name, self.class_name
                        ))
                    })?;
                    default.encode_primitive(&mut buf)?;
                }
            }
        }
        out.write_bytes(buf.as_slice());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_byte() {
        let plain = ClassDescriptor::new("A", 1, vec![]);
        assert_eq!(plain.flags(ProtocolVersion::V2), SC_SERIALIZABLE);

        let custom = ClassDescriptor::new("A", 1, vec![])
            .with_write_object(Rc::new(|_, _, _| Ok(())));
        assert_eq!(
            custom.flags(ProtocolVersion::V2),
            SC_SERIALIZABLE | SC_WRITE_METHOD
        );

        let ext = ClassDescriptor::new("A", 1, vec![]).externalizable();
        assert_eq!(
            ext.flags(ProtocolVersion::V2),
            SC_EXTERNALIZABLE | SC_BLOCK_DATA
        );
        assert_eq!(ext.flags(ProtocolVersion::V1), SC_EXTERNALIZABLE);

        let en = ClassDescriptor::for_enum("Color");
        assert_eq!(en.flags(ProtocolVersion::V2), SC_SERIALIZABLE | SC_ENUM);
    }

    #[test]
    fn test_class_data_layout_is_root_first() {
        let root = Rc::new(ClassDescriptor::new("Root", 1, vec![]));
        let mid = Rc::new(ClassDescriptor::new("Mid", 2, vec![]).with_super(Rc::clone(&root)));
        let leaf = Rc::new(ClassDescriptor::new("Leaf", 3, vec![]).with_super(Rc::clone(&mid)));

        let layout = leaf.class_data_layout();
        let names: Vec<&str> = layout.iter().map(|d| d.class_name.as_str()).collect();
        assert_eq!(names, vec!["Root", "Mid", "Leaf"]);

        assert_eq!(root.class_data_layout().len(), 1);
    }

    #[test]
    fn test_write_primitive_fields_in_declared_order() {
        let desc = ClassDescriptor::new(
            "P",
            1,
            vec![
                FieldDescriptor::primitive("a", PrimitiveType::Short),
                FieldDescriptor::object("skip", "Ljava/lang/String;"),
                FieldDescriptor::primitive("b", PrimitiveType::Boolean),
            ],
        );

        let mut values = HashMap::new();
        values.insert("b".to_string(), Value::Boolean(true));
        values.insert("a".to_string(), Value::Short(0x0102));

        let mut out = DataOutput::new();
        desc.write_primitive_fields(&values, &mut out).unwrap();
        assert_eq!(out.as_slice(), &[0x01, 0x02, 0x01]);
    }

    #[test]
    fn test_write_primitive_fields_defaults() {
        let desc = ClassDescriptor::new(
            "D",
            1,
            vec![
                FieldDescriptor::primitive("i", PrimitiveType::Int),
                FieldDescriptor::primitive("z", PrimitiveType::Boolean),
                FieldDescriptor::primitive("j", PrimitiveType::Long),
            ],
        );

        let mut out = DataOutput::new();
        desc.write_primitive_fields(&HashMap::new(), &mut out).unwrap();
        assert_eq!(out.written(), 4 + 1 + 8);
        assert!(out.as_slice().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_missing_float_field_is_fatal() {
        let desc = ClassDescriptor::new(
            "F",
            1,
            vec![FieldDescriptor::primitive("f", PrimitiveType::Float)],
        );

        let mut out = DataOutput::new();
        let err = desc
            .write_primitive_fields(&HashMap::new(), &mut out)
            .unwrap_err();
        assert!(matches!(err, ObjStreamError::SchemaMismatch(_)));
    }

    #[test]
    fn test_mismatched_field_value_is_fatal() {
        let desc = ClassDescriptor::new(
            "M",
            1,
            vec![FieldDescriptor::primitive("i", PrimitiveType::Int)],
        );

        let mut values = HashMap::new();
        values.insert("i".to_string(), Value::Boolean(true));

        let mut out = DataOutput::new();
        let err = desc.write_primitive_fields(&values, &mut out).unwrap_err();
        assert!(matches!(err, ObjStreamError::SchemaMismatch(_)));
    }

    #[test]
    fn test_primitive_type_codes() {
        assert_eq!(PrimitiveType::Boolean.type_code(), b'Z');
        assert_eq!(PrimitiveType::from_type_code(b'J'), Some(PrimitiveType::Long));
        assert_eq!(PrimitiveType::from_type_code(b'X'), None);
    }
}
