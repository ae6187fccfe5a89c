//! Wire format primitives.
//!
//! Every frame on the socket is a length prefix followed by a payload:
//! ```text
//! ┌──────────────┬─────────────────────────────┐
//! │ Length       │ Payload                     │
//! │ 4 bytes      │ `length` bytes              │
//! │ uint32 BE    │ fields in declared order    │
//! └──────────────┴─────────────────────────────┘
//! ```
//!
//! Payload fields use three primitive encodings:
//! - UTF: `u16` BE byte length, then Java modified UTF-8 bytes (NUL as
//!   `C0 80`, supplementary characters as surrogate pairs)
//! - INT: `i32` BE
//! - BOOL: one byte, `1` true / `0` false
//!
//! A MAP is an INT count followed by `count` UTF key/value pairs.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{GatewayError, Result};

/// Length prefix size in bytes (fixed, exactly 4).
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame payload size (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Largest string the 16-bit length prefix can describe.
pub const MAX_UTF_LEN: usize = u16::MAX as usize;

/// Tag carried by every response payload.
pub const RESPONSE_TAG: &str = "RES";

/// Encode a frame length prefix (Big Endian).
#[inline]
pub fn encode_length_prefix(len: u32) -> [u8; LENGTH_PREFIX_SIZE] {
    len.to_be_bytes()
}

/// Decode a frame length prefix.
///
/// Returns `None` if buffer is too short.
#[inline]
pub fn decode_length_prefix(buf: &[u8]) -> Option<u32> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return None;
    }
    Some(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

/// Append a UTF field.
///
/// The length limit applies to the encoded form, which can be longer than
/// the Rust string for NUL and supplementary characters.
pub fn put_utf(buf: &mut BytesMut, value: &str) -> Result<()> {
    let bytes = cesu8::to_java_cesu8(value);
    if bytes.len() > MAX_UTF_LEN {
        return Err(GatewayError::StringTooLong(bytes.len()));
    }
    buf.put_u16(bytes.len() as u16);
    buf.put_slice(&bytes);
    Ok(())
}

/// Append an INT field.
#[inline]
pub fn put_i32(buf: &mut BytesMut, value: i32) {
    buf.put_i32(value);
}

/// Append a BOOL field.
#[inline]
pub fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(u8::from(value));
}

/// Append a MAP field. An empty map is written as a zero count.
pub fn put_map(buf: &mut BytesMut, map: &BTreeMap<String, String>) -> Result<()> {
    put_count(buf, map.len())?;
    for (key, value) in map {
        put_utf(buf, key)?;
        put_utf(buf, value)?;
    }
    Ok(())
}

/// Append an element count as an INT field.
pub fn put_count(buf: &mut BytesMut, count: usize) -> Result<()> {
    let count = i32::try_from(count)
        .map_err(|_| GatewayError::Protocol(format!("Count {} does not fit in i32", count)))?;
    buf.put_i32(count);
    Ok(())
}

/// Cursor over a frame payload.
///
/// Every read checks the remaining length first, so a truncated payload
/// yields a protocol error rather than a panic.
pub struct PayloadReader<'a> {
    buf: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    /// Create a reader over a complete payload.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.len() < n {
            return Err(GatewayError::Protocol(format!(
                "Truncated payload reading {}: need {} bytes, have {}",
                what,
                n,
                self.buf.len()
            )));
        }
        Ok(())
    }

    /// Read a UTF field.
    pub fn read_utf(&mut self) -> Result<String> {
        self.need(2, "string length")?;
        let len = self.buf.get_u16() as usize;
        self.need(len, "string")?;
        let (head, tail) = self.buf.split_at(len);
        let value = cesu8::from_java_cesu8(head)
            .map_err(|e| GatewayError::Protocol(format!("Invalid modified UTF-8 string: {}", e)))?
            .into_owned();
        self.buf = tail;
        Ok(value)
    }

    /// Read an INT field.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.need(4, "int")?;
        Ok(self.buf.get_i32())
    }

    /// Read a BOOL field. Any non-zero byte is true.
    pub fn read_bool(&mut self) -> Result<bool> {
        self.need(1, "bool")?;
        Ok(self.buf.get_u8() != 0)
    }

    /// Read a UTF field guarded by a preceding BOOL presence flag.
    pub fn read_optional_utf(&mut self) -> Result<Option<String>> {
        if self.read_bool()? {
            Ok(Some(self.read_utf()?))
        } else {
            Ok(None)
        }
    }

    /// Read an element count, rejecting negative values.
    pub fn read_count(&mut self) -> Result<usize> {
        let count = self.read_i32()?;
        usize::try_from(count)
            .map_err(|_| GatewayError::Protocol(format!("Negative count: {}", count)))
    }

    /// Read a MAP field.
    pub fn read_map(&mut self) -> Result<BTreeMap<String, String>> {
        let count = self.read_count()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = self.read_utf()?;
            let value = self.read_utf()?;
            map.insert(key, value);
        }
        Ok(map)
    }
}
