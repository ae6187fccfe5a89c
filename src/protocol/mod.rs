//! Protocol module - wire format, framing, and payload types.
//!
//! This module implements the gateway's binary protocol:
//! - 4-byte length prefix and primitive field encodings
//! - Frame buffer for accumulating partial reads
//! - Request and response payload layouts

mod frame;
mod frame_buffer;
mod request;
mod response;
mod wire_format;

pub use frame::{build_frame, build_frame_parts, Frame};
pub use frame_buffer::FrameBuffer;
pub use request::{
    FieldMap, ModelField, Operation, Request, RequestBody, RequestId, RequestScope, SearchQuery,
    DEFAULT_LIMIT,
};
pub use response::Response;
pub use wire_format::{
    decode_length_prefix, encode_length_prefix, put_bool, put_count, put_i32, put_map, put_utf,
    PayloadReader, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE, MAX_UTF_LEN, RESPONSE_TAG,
};
