//! Error types for objstream

use std::fmt;

/// Main error type for serialization operations
#[derive(Debug)]
pub enum ObjStreamError {
    /// A declared but unimplemented encoding (float/double, non-ASCII strings)
    Unsupported(String),
    /// A value does not fit the declared field or value layout
    SchemaMismatch(String),
    /// An object instance disagrees with its declared class descriptor
    DescriptorMismatch(String),
    /// The configured recursion depth limit was crossed
    DepthLimitExceeded(usize),
    /// Error writing to the underlying sink
    Io(std::io::Error),
}

impl fmt::Display for ObjStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjStreamError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            ObjStreamError::SchemaMismatch(msg) => write!(f, "Schema mismatch: {}", msg),
            ObjStreamError::DescriptorMismatch(msg) => write!(f, "Descriptor mismatch: {}", msg),
            ObjStreamError::DepthLimitExceeded(limit) => {
                write!(f, "Recursion depth limit of {} exceeded", limit)
            }
            ObjStreamError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ObjStreamError {}

impl From<std::io::Error> for ObjStreamError {
    fn from(err: std::io::Error) -> Self {
        ObjStreamError::Io(err)
    }
}
