//! Byte sinks that serialized output is written through
//!
//! Every layer of the writer bottoms out in a [`Sink`]: an append-only
//! destination for raw bytes. The block-mode framing layer implements it
//! too, so primitive encoders can target either a raw buffer or the
//! block-aware stream without knowing which they got.

use bytes::{Bytes, BytesMut};

/// Append-only byte destination
///
/// Writes never fail; resource exhaustion is the owning collaborator's
/// concern, not this layer's.
pub trait Sink {
    /// Append a single byte
    fn write_byte(&mut self, b: u8);

    /// Append a slice of bytes
    fn write_bytes(&mut self, bytes: &[u8]);
}

/// A counting byte buffer, the innermost sink of the writer
#[derive(Debug, Default)]
pub struct DataOutput {
    buf: BytesMut,
    written: usize,
}

impl DataOutput {
    /// Create an empty output buffer
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            written: 0,
        }
    }

    /// Total number of bytes written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// View the accumulated bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the buffer and freeze it
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl Sink for DataOutput {
    fn write_byte(&mut self, b: u8) {
        self.buf.extend_from_slice(&[b]);
        self.written += 1;
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.written += bytes.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_counts_bytes() {
        let mut out = DataOutput::new();
        out.write_byte(0xAC);
        out.write_bytes(&[0xED, 0x00, 0x05]);
        assert_eq!(out.written(), 4);
        assert_eq!(out.as_slice(), &[0xAC, 0xED, 0x00, 0x05]);
    }

    #[test]
    fn test_into_bytes() {
        let mut out = DataOutput::new();
        out.write_bytes(b"abc");
        assert_eq!(&out.into_bytes()[..], b"abc");
    }
}
