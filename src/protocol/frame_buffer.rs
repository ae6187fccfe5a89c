//! Frame buffer for accumulating partial reads.
//!
//! Socket reads land in one `BytesMut`. Once a length prefix has been
//! consumed its payload length is remembered, so a frame split across many
//! reads is decoded only once it is complete.
//!
//! # Example
//!
//! ```
//! use sgw_client::protocol::{build_frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = build_frame(b"payload");
//!
//! // Data arrives in chunks from the socket
//! assert!(buffer.push(&bytes[..3]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[3..]).unwrap();
//! assert_eq!(frames[0].payload(), b"payload");
//! ```

use bytes::{Buf, BytesMut};

use super::wire_format::{decode_length_prefix, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE};
use super::Frame;
use crate::error::{GatewayError, Result};

/// Accumulates inbound bytes and splits off complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    /// Payload length of the frame in progress, set once its prefix is consumed.
    expected: Option<usize>,
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a frame buffer with the default 16MB frame limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            expected: None,
            max_frame_size,
        }
    }

    /// Append `data` and return every frame it completes.
    ///
    /// A trailing partial frame stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns `FrameTooLarge` if a length prefix exceeds the maximum. The
    /// stream cannot be resynchronized after that, so callers must drop the
    /// connection.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let len = match self.expected {
            Some(len) => len,
            None => {
                let Some(len) = decode_length_prefix(&self.buffer) else {
                    return Ok(None);
                };
                if len > self.max_frame_size {
                    return Err(GatewayError::FrameTooLarge {
                        size: len,
                        max: self.max_frame_size,
                    });
                }
                self.buffer.advance(LENGTH_PREFIX_SIZE);
                len as usize
            }
        };

        if self.buffer.len() < len {
            self.expected = Some(len);
            return Ok(None);
        }

        self.expected = None;
        Ok(Some(Frame::new(self.buffer.split_to(len).freeze())))
    }

    /// Whether a frame has been started but not completed.
    ///
    /// Used on EOF to tell a clean close from a short read.
    pub fn has_partial_frame(&self) -> bool {
        !self.buffer.is_empty() || self.expected.is_some()
    }

    /// Bytes received but not yet returned in a frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop buffered bytes and any frame in progress.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.expected = None;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
