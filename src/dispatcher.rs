//! Response dispatcher.
//!
//! A single background task per client owns the read half of the link. It
//! extracts frames, decodes responses and routes each one to the pending
//! table it was registered in. It also watches the link's writer task. When
//! either side breaks (a failed read, EOF, or a failed write) it tears the
//! connection down, waits the reconnect delay and tries again, forever,
//! until the client is stopped.
//!
//! Requests that were in flight on a broken link are left pending; the
//! gateway has no session resumption and the client does not fail them.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinError;

use crate::connection::{Connection, Link};
use crate::error::{GatewayError, Result};
use crate::pending::{PendingRequests, RequestKind};
use crate::protocol::{Frame, FrameBuffer, Response};

/// Default error messages for failed responses without one.
pub const GET_FAILED: &str = "Get request failed";
pub const COUNT_FAILED: &str = "Count request failed";
pub const SET_FAILED: &str = "Set request failed";
pub const DELETE_FAILED: &str = "Delete request failed";

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Dispatcher main loop.
///
/// `link` comes from the initial connection attempt, if it succeeded.
pub(crate) async fn run(
    connection: Arc<Connection>,
    pending: Arc<PendingRequests>,
    mut link: Option<Link>,
) {
    let delay = connection.config().reconnect_delay;
    let max_frame_size = connection.config().max_frame_size;

    while connection.is_running() {
        let Some(mut current) = link.take() else {
            if !connection.pause(delay).await {
                break;
            }
            link = tokio::select! {
                result = connection.connect() => result.ok(),
                _ = connection.stopped() => break,
            };
            continue;
        };

        let outcome = tokio::select! {
            result = read_frames(&mut current.reader, &pending, max_frame_size) => result,
            joined = &mut current.writer_task => writer_exit(joined),
            _ = connection.stopped() => break,
        };

        if !connection.is_running() {
            break;
        }
        match outcome {
            Ok(()) => tracing::info!(
                "Gateway closed the connection, reconnecting in {:?}",
                delay
            ),
            Err(e) => tracing::warn!("Link broken ({}), reconnecting in {:?}", e, delay),
        }
        connection.disconnect();
    }

    tracing::debug!("Dispatcher for {}:{} exited", connection.host(), connection.port());
}

/// Map the writer task's exit to a link failure.
///
/// The writer only stops on its own when a write fails; a clean exit means
/// its handle was dropped underneath a live link.
fn writer_exit(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(Ok(())) => Err(GatewayError::ConnectionClosed),
        Ok(Err(e)) => Err(e),
        Err(e) => Err(GatewayError::Io(std::io::Error::other(e))),
    }
}

/// Read and dispatch frames until the link ends.
///
/// Returns `Ok(())` when the peer closes cleanly between frames. EOF in the
/// middle of a frame, read errors and oversized length prefixes are errors.
pub(crate) async fn read_frames<R>(
    reader: &mut R,
    pending: &PendingRequests,
    max_frame_size: u32,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_frame_size(max_frame_size);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            if frame_buffer.has_partial_frame() {
                return Err(GatewayError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                )));
            }
            return Ok(());
        }

        for frame in frame_buffer.push(&buf[..n])? {
            dispatch_frame(pending, &frame);
        }
    }
}

/// Decode one frame and route it. Never fails the link.
pub(crate) fn dispatch_frame(pending: &PendingRequests, frame: &Frame) {
    match Response::decode(frame.payload()) {
        Ok(Some(response)) => {
            route_response(pending, response);
        }
        Ok(None) => {
            tracing::debug!(
                "Discarding non-response frame ({} bytes)",
                frame.payload_len()
            );
        }
        Err(e) => {
            tracing::warn!("Bad response format: {}", e);
        }
    }
}

/// Complete the pending request a response belongs to.
///
/// Tables are searched in the order lookups, counts, writes, deletes. The
/// outcome (COUNT parsing included) is only built once a match is found.
/// Returns the category that was resolved, or `None` when nothing was
/// waiting.
pub fn route_response(pending: &PendingRequests, response: Response) -> Option<RequestKind> {
    let request_id = response.request_id.clone();

    let Some(kind) = pending.kind_of(&request_id) else {
        tracing::debug!("No pending request for response {}", request_id);
        return None;
    };

    let resolved = match kind {
        RequestKind::Lookup => pending
            .lookups
            .resolve_with(&request_id, || response.into_value(GET_FAILED)),
        RequestKind::Count => pending
            .counts
            .resolve_with(&request_id, || response.into_count(COUNT_FAILED)),
        RequestKind::Write => pending
            .writes
            .resolve_with(&request_id, || response.into_ack(SET_FAILED)),
        RequestKind::Delete => pending
            .deletes
            .resolve_with(&request_id, || response.into_ack(DELETE_FAILED)),
    };

    resolved.then_some(kind)
}
