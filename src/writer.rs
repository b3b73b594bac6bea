//! The object graph writer: block-data framing plus the protocol driver
//!
//! `ObjectWriter` walks a typed value graph and emits the stream
//! protocol's control bytes, descriptor records, and field data,
//! coordinating the handle table and block-mode framing. It is a
//! single-session, single-threaded writer: one logical writer per
//! outbound stream, no internal locking.

use crate::descriptor::{ClassDescriptor, FieldKind, ProtocolVersion};
use crate::error::ObjStreamError;
use crate::handles::{HandleEntry, HandleTable};
use crate::sink::{DataOutput, Sink};
use crate::type_codes::{TypeCode, BASE_WIRE_HANDLE, STREAM_MAGIC, STREAM_VERSION};
use crate::value::{ArrayValue, ClassValue, EnumValue, ObjectValue, Value};
use bytes::Bytes;
use std::rc::Rc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// The root class every enum type descends from; the enum constant record
/// carries the enum type's descriptor, never this root
const ENUM_ROOT_CLASS: &str = "java.lang.Enum";

/// Hook that appends class annotation block data while a descriptor is
/// being written
pub type AnnotateHook =
    Rc<dyn Fn(&mut ObjectWriter, &ClassDescriptor) -> Result<(), ObjStreamError>>;

/// Serializes object graphs into the stream protocol's wire format
///
/// Call [`write_header`](Self::write_header) once, then
/// [`write_value`](Self::write_value) per top-level value, then
/// [`into_bytes`](Self::into_bytes) to take the finished stream.
pub struct ObjectWriter {
    out: DataOutput,
    block_mode: bool,
    block_buf: Vec<u8>,
    depth: usize,
    depth_limit: Option<usize>,
    handles: HandleTable,
    protocol: ProtocolVersion,
    annotate_class: Option<AnnotateHook>,
    annotate_proxy_class: Option<AnnotateHook>,
}

impl Default for ObjectWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectWriter {
    /// Create a writer speaking protocol version 2
    pub fn new() -> Self {
        Self::with_protocol(ProtocolVersion::V2)
    }

    /// Create a writer with an explicit protocol version
    pub fn with_protocol(protocol: ProtocolVersion) -> Self {
        Self {
            out: DataOutput::new(),
            block_mode: true,
            block_buf: Vec::new(),
            depth: 0,
            depth_limit: None,
            handles: HandleTable::new(),
            protocol,
            annotate_class: None,
            annotate_proxy_class: None,
        }
    }

    /// Cap the write recursion depth; deeper graphs fail instead of
    /// growing the stack without bound
    pub fn set_depth_limit(&mut self, limit: Option<usize>) {
        self.depth_limit = limit;
    }

    /// Install a hook that annotates non-proxy class descriptors
    pub fn set_annotate_class(&mut self, hook: AnnotateHook) {
        self.annotate_class = Some(hook);
    }

    /// Install a hook that annotates proxy class descriptors
    pub fn set_annotate_proxy_class(&mut self, hook: AnnotateHook) {
        self.annotate_proxy_class = Some(hook);
    }

    /// The negotiated protocol version
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Current write recursion depth, for diagnostics
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bytes flushed to the underlying sink so far
    pub fn bytes_written(&self) -> usize {
        self.out.written()
    }

    /// Write the stream header: magic `0xACED`, version `0x0005`
    ///
    /// Must be written once, before any value.
    pub fn write_header(&mut self) {
        self.out.write_bytes(&STREAM_MAGIC.to_be_bytes());
        self.out.write_bytes(&STREAM_VERSION.to_be_bytes());
    }

    /// Drain the session and freeze the finished byte stream
    pub fn into_bytes(mut self) -> Bytes {
        self.flush();
        self.out.into_bytes()
    }

    /// Toggle block mode, flushing any buffered block data on an actual
    /// change; returns the previous mode
    pub fn set_block_mode(&mut self, mode: bool) -> bool {
        let old_mode = self.block_mode;
        if old_mode == mode {
            return old_mode;
        }
        self.flush();
        self.block_mode = mode;
        old_mode
    }

    /// Emit any buffered block data, framed by a block header while in
    /// block mode
    pub fn flush(&mut self) {
        if self.block_buf.is_empty() {
            return;
        }
        if self.block_mode {
            let len = self.block_buf.len();
            self.write_block_header(len);
        }
        self.out.write_bytes(&self.block_buf);
        self.block_buf.clear();
    }

    fn write_block_header(&mut self, len: usize) {
        if len <= 0xFF {
            self.out.write_byte(TypeCode::BlockData.to_u8());
            self.out.write_byte(len as u8);
        } else {
            self.out.write_byte(TypeCode::BlockDataLong.to_u8());
            self.out.write_bytes(&(len as u32).to_be_bytes());
        }
    }

    /// Append a byte; buffered while block mode is on, raw otherwise
    pub fn write_byte(&mut self, b: u8) {
        if self.block_mode {
            self.block_buf.push(b);
        } else {
            self.out.write_byte(b);
        }
    }

    /// Append bytes; buffered while block mode is on, raw otherwise
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.block_mode {
            self.block_buf.extend_from_slice(bytes);
        } else {
            self.out.write_bytes(bytes);
        }
    }

    /// Encode a primitive value through the block-aware output, for
    /// custom write hooks pushing field-style data into block regions
    pub fn write_primitive(&mut self, value: &Value) -> Result<(), ObjStreamError> {
        value.encode_primitive(self)
    }

    /// Write one top-level value, shared
    pub fn write_value(&mut self, value: &Value) -> Result<(), ObjStreamError> {
        self.write_value_internal(value, false)
    }

    /// Write one top-level value without ever registering it in, or
    /// resolving it against, the handle table
    pub fn write_unshared(&mut self, value: &Value) -> Result<(), ObjStreamError> {
        self.write_value_internal(value, true)
    }

    /// Emit a reset marker and forget all assigned handles
    pub fn reset(&mut self) -> Result<(), ObjStreamError> {
        if self.depth > 0 {
            return Err(ObjStreamError::SchemaMismatch(
                "stream reset during an object write".to_string(),
            ));
        }
        let old_mode = self.set_block_mode(false);
        self.write_byte(TypeCode::Reset.to_u8());
        self.handles.clear();
        self.set_block_mode(old_mode);
        Ok(())
    }

    /// Write a protocol-level failure object
    ///
    /// The handle table is reset before and after the failure object and
    /// block mode is left disabled, so partial state from the failed
    /// write cannot leak into a subsequent independent write.
    pub fn write_fatal_exception(&mut self, error_object: &Value) -> Result<(), ObjStreamError> {
        self.handles.clear();
        self.set_block_mode(false);
        self.write_byte(TypeCode::Exception.to_u8());
        let result = self.write_value_internal(error_object, false);
        self.handles.clear();
        self.set_block_mode(false);
        result
    }

    fn write_value_internal(&mut self, value: &Value, unshared: bool) -> Result<(), ObjStreamError> {
        let old_mode = self.set_block_mode(false);
        self.depth += 1;
        let result = match self.depth_limit {
            Some(limit) if self.depth > limit => Err(ObjStreamError::DepthLimitExceeded(limit)),
            _ => self.dispatch_value(value, unshared),
        };
        self.depth -= 1;
        self.set_block_mode(old_mode);
        result
    }

    fn dispatch_value(&mut self, value: &Value, unshared: bool) -> Result<(), ObjStreamError> {
        if matches!(value, Value::Null) {
            self.write_null();
            return Ok(());
        }
        if !unshared {
            if let Some(entry) = HandleEntry::for_value(value) {
                if let Some(handle) = self.handles.lookup(&entry) {
                    self.write_handle(handle);
                    return Ok(());
                }
            }
        }
        match value {
            Value::Class(class) => self.write_class(class, unshared),
            Value::ClassDesc(desc) => self.write_class_desc(Some(desc), unshared),
            Value::String(s) => self.write_string(s, unshared),
            Value::Array(array) => self.write_array(array, unshared),
            Value::Enum(constant) => self.write_enum(constant, unshared),
            Value::Object(object) => self.write_ordinary_object(object, unshared),
            other => Err(ObjStreamError::SchemaMismatch(format!(
                "cannot write {:?} at an object position",
                other
            ))),
        }
    }

    fn write_null(&mut self) {
        self.write_byte(TypeCode::Null.to_u8());
    }

    fn write_handle(&mut self, handle: u32) {
        self.write_byte(TypeCode::Reference.to_u8());
        self.write_bytes(&(BASE_WIRE_HANDLE + handle).to_be_bytes());
    }

    fn write_class(&mut self, class: &Rc<ClassValue>, unshared: bool) -> Result<(), ObjStreamError> {
        self.write_byte(TypeCode::Class.to_u8());
        self.write_class_desc(Some(&class.descriptor), false)?;
        self.handles
            .assign(HandleEntry::Class(Rc::clone(class)), unshared);
        Ok(())
    }

    fn write_class_desc(
        &mut self,
        desc: Option<&Rc<ClassDescriptor>>,
        unshared: bool,
    ) -> Result<(), ObjStreamError> {
        let desc = match desc {
            Some(desc) => desc,
            None => {
                self.write_null();
                return Ok(());
            }
        };
        if !unshared {
            if let Some(handle) = self
                .handles
                .lookup(&HandleEntry::Descriptor(Rc::clone(desc)))
            {
                self.write_handle(handle);
                return Ok(());
            }
        }
        if desc.is_proxy {
            self.write_proxy_desc(desc, unshared)
        } else {
            self.write_non_proxy_desc(desc, unshared)
        }
    }

    fn write_non_proxy_desc(
        &mut self,
        desc: &Rc<ClassDescriptor>,
        unshared: bool,
    ) -> Result<(), ObjStreamError> {
        self.write_byte(TypeCode::ClassDesc.to_u8());
        self.handles
            .assign(HandleEntry::Descriptor(Rc::clone(desc)), unshared);
        self.write_descriptor_body(desc)?;
        self.write_class_annotation(desc, false)?;
        self.write_class_desc(desc.super_descriptor.as_ref(), false)
    }

    fn write_proxy_desc(
        &mut self,
        desc: &Rc<ClassDescriptor>,
        unshared: bool,
    ) -> Result<(), ObjStreamError> {
        self.write_byte(TypeCode::ProxyClassDesc.to_u8());
        self.handles
            .assign(HandleEntry::Descriptor(Rc::clone(desc)), unshared);
        self.write_bytes(&(desc.proxy_interfaces.len() as u32).to_be_bytes());
        for iface in &desc.proxy_interfaces {
            self.write_utf(iface)?;
        }
        self.write_class_annotation(desc, true)?;
        self.write_class_desc(desc.super_descriptor.as_ref(), false)
    }

    /// The descriptor body: name, version id, flags, field layout
    fn write_descriptor_body(&mut self, desc: &ClassDescriptor) -> Result<(), ObjStreamError> {
        self.write_utf(&desc.class_name)?;
        self.write_bytes(&desc.serial_version_uid.to_be_bytes());
        self.write_byte(desc.flags(self.protocol));
        if desc.fields.len() > 0xFFFF {
            return Err(ObjStreamError::SchemaMismatch(format!(
                "class {} declares more than 65535 fields",
                desc.class_name
            )));
        }
        self.write_bytes(&(desc.fields.len() as u16).to_be_bytes());
        for field in &desc.fields {
            self.write_byte(field.wire_type_code()?);
            self.write_utf(&field.name)?;
            if let FieldKind::Object(type_string) = &field.kind {
                self.write_type_string(type_string)?;
            }
        }
        Ok(())
    }

    /// The annotation region that follows every descriptor body: a block
    /// region for the optional annotate hook, closed by an end marker
    fn write_class_annotation(
        &mut self,
        desc: &ClassDescriptor,
        proxy: bool,
    ) -> Result<(), ObjStreamError> {
        self.set_block_mode(true);
        let hook = if proxy {
            self.annotate_proxy_class.clone()
        } else {
            self.annotate_class.clone()
        };
        let result = match hook {
            Some(hook) => hook(self, desc),
            None => Ok(()),
        };
        self.set_block_mode(false);
        result?;
        self.write_byte(TypeCode::EndBlockData.to_u8());
        Ok(())
    }

    fn write_string(&mut self, s: &str, unshared: bool) -> Result<(), ObjStreamError> {
        let len = self.utf_len(s)?;
        self.handles
            .assign(HandleEntry::Str(s.to_string()), unshared);
        if len <= 0xFFFF {
            self.write_byte(TypeCode::String.to_u8());
            self.write_utf_len(s, len)
        } else {
            self.write_byte(TypeCode::LongString.to_u8());
            self.write_long_utf(s, len)
        }
    }

    /// Handle-checked string write, used for field type strings and enum
    /// constant names
    fn write_type_string(&mut self, s: &str) -> Result<(), ObjStreamError> {
        if let Some(handle) = self.handles.lookup(&HandleEntry::Str(s.to_string())) {
            self.write_handle(handle);
            Ok(())
        } else {
            self.write_string(s, false)
        }
    }

    fn utf_len(&self, s: &str) -> Result<usize, ObjStreamError> {
        // ASCII fast path only: the protocol wants modified UTF-8, which
        // is not implemented, so anything else fails before bytes move.
        if !s.is_ascii() {
            return Err(ObjStreamError::Unsupported(
                "non-ASCII string encoding is not implemented".to_string(),
            ));
        }
        Ok(s.len())
    }

    fn write_utf(&mut self, s: &str) -> Result<(), ObjStreamError> {
        let len = self.utf_len(s)?;
        self.write_utf_len(s, len)
    }

    fn write_utf_len(&mut self, s: &str, len: usize) -> Result<(), ObjStreamError> {
        if len > 0xFFFF {
            return Err(ObjStreamError::SchemaMismatch(
                "UTF length exceeds 65535 bytes".to_string(),
            ));
        }
        self.write_bytes(&(len as u16).to_be_bytes());
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    fn write_long_utf(&mut self, s: &str, len: usize) -> Result<(), ObjStreamError> {
        self.write_bytes(&(len as u64).to_be_bytes());
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    fn write_enum(
        &mut self,
        constant: &Rc<EnumValue>,
        unshared: bool,
    ) -> Result<(), ObjStreamError> {
        self.write_byte(TypeCode::Enum.to_u8());
        // A constant-specific subclass descriptor stands in front of the
        // real enum type; write the first descriptor whose super is the
        // enum root.
        let desc = &constant.descriptor;
        let type_desc = match &desc.super_descriptor {
            Some(sup) if sup.class_name != ENUM_ROOT_CLASS => Rc::clone(sup),
            _ => Rc::clone(desc),
        };
        self.write_class_desc(Some(&type_desc), false)?;
        self.handles
            .assign(HandleEntry::Enum(Rc::clone(constant)), unshared);
        self.write_type_string(&constant.constant_name)
    }

    fn write_array(&mut self, array: &Rc<ArrayValue>, unshared: bool) -> Result<(), ObjStreamError> {
        self.write_byte(TypeCode::Array.to_u8());
        self.write_class_desc(Some(&array.descriptor), false)?;
        self.handles
            .assign(HandleEntry::Array(Rc::clone(array)), unshared);
        self.write_bytes(&(array.elements.len() as u32).to_be_bytes());
        match &array.element_kind {
            FieldKind::Primitive(ty) => {
                for element in &array.elements {
                    if element.type_code() != Some(ty.type_code()) {
                        return Err(ObjStreamError::SchemaMismatch(format!(
                            "array of {} holds {:?}",
                            ty.type_code() as char,
                            element
                        )));
                    }
                    element.encode_primitive(self)?;
                }
            }
            FieldKind::Object(_) => {
                for element in &array.elements {
                    self.write_value_internal(element, false)?;
                }
            }
        }
        Ok(())
    }

    fn write_ordinary_object(
        &mut self,
        object: &Rc<ObjectValue>,
        unshared: bool,
    ) -> Result<(), ObjStreamError> {
        let desc = object.descriptor.clone().ok_or_else(|| {
            ObjStreamError::DescriptorMismatch(
                "object instance has no class descriptor".to_string(),
            )
        })?;
        self.write_byte(TypeCode::Object.to_u8());
        self.write_class_desc(Some(&desc), false)?;
        self.handles
            .assign(HandleEntry::Object(Rc::clone(object)), unshared);
        if desc.has_write_external && !desc.is_proxy {
            self.write_external_data(object, &desc)
        } else {
            self.write_serial_data(object, &desc)
        }
    }

    /// Default serial form: one slot per descriptor in the layout chain,
    /// root ancestor first
    fn write_serial_data(
        &mut self,
        object: &ObjectValue,
        desc: &Rc<ClassDescriptor>,
    ) -> Result<(), ObjStreamError> {
        for slot in desc.class_data_layout() {
            if slot.has_write_object {
                self.set_block_mode(true);
                let result = match slot.write_object_hook.clone() {
                    Some(hook) => hook(self, object, &slot),
                    None => Ok(()),
                };
                self.set_block_mode(false);
                result?;
                self.write_byte(TypeCode::EndBlockData.to_u8());
            } else {
                self.default_write_fields(object, &slot)?;
            }
        }
        Ok(())
    }

    fn write_external_data(
        &mut self,
        object: &ObjectValue,
        desc: &ClassDescriptor,
    ) -> Result<(), ObjStreamError> {
        if self.protocol == ProtocolVersion::V1 {
            // No framing under protocol 1: the hook's output is the data.
            let hook = desc.write_external_hook.clone().ok_or_else(|| {
                ObjStreamError::DescriptorMismatch(format!(
                    "externalizable class {} has no writeExternal hook",
                    desc.class_name
                ))
            })?;
            hook(self, object)
        } else {
            self.set_block_mode(true);
            let result = match desc.write_external_hook.clone() {
                Some(hook) => hook(self, object),
                None => Ok(()),
            };
            self.set_block_mode(false);
            result?;
            self.write_byte(TypeCode::EndBlockData.to_u8());
            Ok(())
        }
    }

    /// Write one slot's default field data: primitives first, then each
    /// object field in declared order, absent fields as null
    fn default_write_fields(
        &mut self,
        object: &ObjectValue,
        slot: &ClassDescriptor,
    ) -> Result<(), ObjStreamError> {
        {
            let values = object.field_values.borrow();
            slot.write_primitive_fields(&values, self)?;
        }
        for field in slot.object_fields() {
            // the borrow is released before recursing so cyclic graphs
            // re-entering this object resolve through the handle table
            let value = object.field_values.borrow().get(&field.name).cloned();
            match value {
                Some(value) => self.write_value_internal(&value, field.unshared)?,
                None => self.write_value_internal(&Value::Null, field.unshared)?,
            }
        }
        Ok(())
    }

    /// For writeObject hooks: emit the slot's default field data from
    /// inside a custom write, then return to block mode
    pub fn default_write_object(
        &mut self,
        object: &ObjectValue,
        slot: &ClassDescriptor,
    ) -> Result<(), ObjStreamError> {
        self.set_block_mode(false);
        self.default_write_fields(object, slot)?;
        self.set_block_mode(true);
        Ok(())
    }
}

impl Sink for ObjectWriter {
    fn write_byte(&mut self, b: u8) {
        ObjectWriter::write_byte(self, b);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        ObjectWriter::write_bytes(self, bytes);
    }
}

/// Serialize a sequence of top-level values and flush the finished
/// stream to the async writer
///
/// # Example
///
/// ```rust,no_run
/// use objstream::{write_stream, Value};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut buffer = Vec::new();
///     write_stream(&[Value::Null], &mut buffer).await?;
///     assert_eq!(buffer, [0xAC, 0xED, 0x00, 0x05, 0x70]);
///     Ok(())
/// }
/// ```
pub async fn write_stream<W: AsyncWrite + Unpin>(
    values: &[Value],
    writer: &mut W,
) -> Result<(), ObjStreamError> {
    let mut out = ObjectWriter::new();
    out.write_header();
    for value in values {
        out.write_value(value)?;
    }
    let buf = out.into_bytes();
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
