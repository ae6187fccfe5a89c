//! # sgw-client
//!
//! Async Rust client for a storage gateway speaking a length-prefixed
//! binary protocol over TCP.
//!
//! ## Architecture
//!
//! - **Writer task**: one per connection; serializes all outbound frames
//! - **Dispatcher task**: one per client; reads responses, completes the
//!   matching pending request, and reconnects after link failures
//! - **Pending tables**: per-category maps from request identifier to a
//!   one-shot completion handle
//!
//! Every operation returns a [`ResponseHandle`] as soon as its frame has
//! been queued; awaiting the handle yields the gateway's answer.
//!
//! ## Example
//!
//! ```ignore
//! use sgw_client::{GatewayClient, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> sgw_client::Result<()> {
//!     let client = GatewayClient::builder("127.0.0.1", 7070).start().await?;
//!     let users = client.namespace("main", "s3cret", "users");
//!
//!     users.set("alice", r#"{"age":30}"#).await?.await?;
//!     let adults = users
//!         .count(&SearchQuery::new().filter("age", ">=18"))
//!         .await?
//!         .await?;
//!     println!("{:?}", adults);
//!
//!     client.stop().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod transport;
pub mod writer;

mod client;
mod namespace;

pub use client::{ClientBuilder, GatewayClient};
pub use connection::{ConnectionConfig, ConnectionState};
pub use error::{GatewayError, Result};
pub use namespace::Namespace;
pub use pending::ResponseHandle;
pub use protocol::{FieldMap, ModelField, RequestId, RequestScope, SearchQuery};
pub use writer::WriterConfig;
