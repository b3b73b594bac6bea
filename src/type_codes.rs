//! Wire constants for the Java Object Serialization Stream protocol

/// Stream header magic, written as two big-endian bytes
pub const STREAM_MAGIC: u16 = 0xACED;

/// Stream protocol version, written as two big-endian bytes
pub const STREAM_VERSION: u16 = 0x0005;

/// Base offset added to handle-table indices to form wire handles
pub const BASE_WIRE_HANDLE: u32 = 0x7E0000;

/// Control bytes used in the serialization stream
///
/// Every composite record in the stream is introduced by one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeCode {
    Null = 0x70,
    Reference = 0x71,
    ClassDesc = 0x72,
    Object = 0x73,
    String = 0x74,
    Array = 0x75,
    Class = 0x76,
    BlockData = 0x77,
    EndBlockData = 0x78,
    Reset = 0x79,
    BlockDataLong = 0x7A,
    Exception = 0x7B,
    LongString = 0x7C,
    ProxyClassDesc = 0x7D,
    Enum = 0x7E,
}

impl TypeCode {
    /// Convert from u8 to TypeCode
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x70 => Some(TypeCode::Null),
            0x71 => Some(TypeCode::Reference),
            0x72 => Some(TypeCode::ClassDesc),
            0x73 => Some(TypeCode::Object),
            0x74 => Some(TypeCode::String),
            0x75 => Some(TypeCode::Array),
            0x76 => Some(TypeCode::Class),
            0x77 => Some(TypeCode::BlockData),
            0x78 => Some(TypeCode::EndBlockData),
            0x79 => Some(TypeCode::Reset),
            0x7A => Some(TypeCode::BlockDataLong),
            0x7B => Some(TypeCode::Exception),
            0x7C => Some(TypeCode::LongString),
            0x7D => Some(TypeCode::ProxyClassDesc),
            0x7E => Some(TypeCode::Enum),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}
