//! Back-reference handle table
//!
//! Reference-type values are registered here the first time they are
//! written; a repeat encounter within the same write session resolves to
//! the assigned index and is emitted as a reference instead of a second
//! full encoding. Composite values match by `Rc` identity; strings match
//! by value, mirroring the target protocol's interned type strings.

use crate::descriptor::ClassDescriptor;
use crate::value::{ArrayValue, ClassValue, EnumValue, ObjectValue, Value};
use std::rc::Rc;

/// A value registered in the handle table
#[derive(Debug, Clone)]
pub(crate) enum HandleEntry {
    Str(String),
    Array(Rc<ArrayValue>),
    Enum(Rc<EnumValue>),
    Class(Rc<ClassValue>),
    Descriptor(Rc<ClassDescriptor>),
    Object(Rc<ObjectValue>),
}

impl HandleEntry {
    /// The handle entry a value would occupy, if its kind is reference-typed
    pub(crate) fn for_value(value: &Value) -> Option<HandleEntry> {
        match value {
            Value::String(s) => Some(HandleEntry::Str(s.clone())),
            Value::Array(array) => Some(HandleEntry::Array(Rc::clone(array))),
            Value::Enum(constant) => Some(HandleEntry::Enum(Rc::clone(constant))),
            Value::Class(class) => Some(HandleEntry::Class(Rc::clone(class))),
            Value::ClassDesc(desc) => Some(HandleEntry::Descriptor(Rc::clone(desc))),
            Value::Object(object) => Some(HandleEntry::Object(Rc::clone(object))),
            _ => None,
        }
    }

    fn matches(&self, other: &HandleEntry) -> bool {
        match (self, other) {
            (HandleEntry::Str(a), HandleEntry::Str(b)) => a == b,
            (HandleEntry::Array(a), HandleEntry::Array(b)) => Rc::ptr_eq(a, b),
            (HandleEntry::Enum(a), HandleEntry::Enum(b)) => Rc::ptr_eq(a, b),
            (HandleEntry::Class(a), HandleEntry::Class(b)) => Rc::ptr_eq(a, b),
            (HandleEntry::Descriptor(a), HandleEntry::Descriptor(b)) => Rc::ptr_eq(a, b),
            (HandleEntry::Object(a), HandleEntry::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Ordered, append-only table of previously written reference values
///
/// A value's position here plus the base wire handle offset is the
/// back-reference handle on the wire. Handles are stable only within one
/// write session; `clear` starts a fresh session.
#[derive(Debug, Default)]
pub(crate) struct HandleTable {
    entries: Vec<HandleEntry>,
}

impl HandleTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Forget every assigned handle
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Find the handle assigned to an equivalent value, if any
    pub(crate) fn lookup(&self, entry: &HandleEntry) -> Option<u32> {
        self.entries
            .iter()
            .position(|e| e.matches(entry))
            .map(|i| i as u32)
    }

    /// Register a first-seen value for future back-references
    ///
    /// Unshared values are never registered; they are always written in
    /// full and can never be the target of a reference.
    pub(crate) fn assign(&mut self, entry: HandleEntry, unshared: bool) {
        if unshared {
            return;
        }
        self.entries.push(entry);
    }
}
