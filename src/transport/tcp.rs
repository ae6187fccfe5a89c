//! TCP connection establishment.
//!
//! # Example
//!
//! ```ignore
//! use sgw_client::transport::{connect, DEFAULT_CONNECT_TIMEOUT};
//!
//! let (reader, writer) = connect("127.0.0.1", 7420, DEFAULT_CONNECT_TIMEOUT).await?;
//! ```

use std::time::Duration;

use tokio::net::TcpStream;

use crate::error::{GatewayError, Result};

/// Read half handed to the dispatcher.
pub type TcpReadHalf = tokio::net::tcp::OwnedReadHalf;

/// Write half handed to the writer task.
pub type TcpWriteHalf = tokio::net::tcp::OwnedWriteHalf;

/// Default timeout for a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to `host:port` and split the stream.
///
/// Nagle's algorithm is disabled: requests are small and latency-bound.
///
/// # Errors
///
/// Returns an I/O error if the connection is refused or does not complete
/// within `timeout`.
pub async fn connect(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<(TcpReadHalf, TcpWriteHalf)> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            GatewayError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connection to {}:{} timed out", host, port),
            ))
        })??;

    stream.set_nodelay(true)?;

    Ok(stream.into_split())
}
