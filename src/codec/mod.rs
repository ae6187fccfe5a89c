//! Codec module - typed views over the JSON documents the gateway stores.
//!
//! The wire protocol treats stored values as opaque strings. SET carries a
//! JSON document and SEARCH answers with a JSON array of documents;
//! [`JsonCodec`] converts between those strings and typed values.
//!
//! # Example
//!
//! ```
//! use sgw_client::codec::JsonCodec;
//!
//! let encoded = JsonCodec::encode(&vec![1, 2, 3]).unwrap();
//! let decoded: Vec<i32> = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, vec![1, 2, 3]);
//! ```

mod json;

pub use json::JsonCodec;
