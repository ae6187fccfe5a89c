//! Transport module - TCP socket handling.
//!
//! Provides connection establishment for the gateway link. The stream is
//! split so the read half belongs to the dispatcher and the write half to
//! the writer task.

mod tcp;

pub use tcp::{connect, TcpReadHalf, TcpWriteHalf, DEFAULT_CONNECT_TIMEOUT};
