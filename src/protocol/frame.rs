//! Frame struct and frame builders.
//!
//! A frame is the unit of transmission: a 4-byte length prefix followed by
//! an opaque payload. Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use sgw_client::protocol::{build_frame, LENGTH_PREFIX_SIZE};
//!
//! let bytes = build_frame(b"hello");
//! assert_eq!(bytes.len(), LENGTH_PREFIX_SIZE + 5);
//! assert_eq!(&bytes[..4], &[0, 0, 0, 5]);
//! ```

use bytes::Bytes;

use super::wire_format::{encode_length_prefix, LENGTH_PREFIX_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from a payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Create a frame from raw bytes (copies data).
    pub fn from_slice(payload: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Build a complete frame as a single byte vector.
///
/// Use `build_frame_parts` for scatter/gather I/O (writev).
pub fn build_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&encode_length_prefix(payload.len() as u32));
    buf.extend_from_slice(payload);
    buf
}

/// Build frame parts for scatter/gather I/O.
///
/// Returns the encoded length prefix and a reference to the payload.
pub fn build_frame_parts(payload: &[u8]) -> ([u8; LENGTH_PREFIX_SIZE], &[u8]) {
    (encode_length_prefix(payload.len() as u32), payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(Bytes::from_static(b"hello"));
        assert_eq!(frame.payload(), b"hello");
        assert_eq!(frame.payload_len(), 5);
    }

    #[test]
    fn test_frame_from_slice() {
        let frame = Frame::from_slice(b"test");
        assert_eq!(frame.payload(), b"test");
    }

    #[test]
    fn test_build_frame() {
        let bytes = build_frame(b"hello");
        assert_eq!(bytes.len(), LENGTH_PREFIX_SIZE + 5);
        assert_eq!(&bytes[..LENGTH_PREFIX_SIZE], &[0, 0, 0, 5]);
        assert_eq!(&bytes[LENGTH_PREFIX_SIZE..], b"hello");
    }

    #[test]
    fn test_build_frame_empty_payload() {
        let bytes = build_frame(b"");
        assert_eq!(bytes, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_build_frame_parts() {
        let (prefix, payload) = build_frame_parts(b"hello");
        assert_eq!(prefix, [0, 0, 0, 5]);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn test_build_frame_roundtrip() {
        use super::super::FrameBuffer;

        let bytes = build_frame(b"0123456789");

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"0123456789");
    }
}
