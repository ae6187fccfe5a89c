//! Connection lifecycle.
//!
//! [`Connection`] owns the gateway link: it connects, installs a writer task
//! for the socket's write half, tears the link down on failure, and tracks
//! the observable [`ConnectionState`]:
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected
//!      ▲               │              │
//!      └───── failure ─┴── I/O error ─┘
//!
//! any state ── stop() ──► Stopped (terminal)
//! ```
//!
//! [`Connection::connect`] hands the dispatcher a `Link`: the read half,
//! which only the dispatcher reads, and the writer task's join handle, so a
//! failed write tears the link down just like a failed read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{GatewayError, Result};
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::transport::{self, TcpReadHalf, DEFAULT_CONNECT_TIMEOUT};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Default delay between a link failure and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// An established link, as owned by the dispatcher.
pub(crate) struct Link {
    pub(crate) reader: TcpReadHalf,
    /// Completes when the writer task exits, with an error if a write failed.
    pub(crate) writer_task: JoinHandle<Result<()>>,
}

/// Link state as observed by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Entered only through `stop()`; never left.
    Stopped,
}

/// Configuration for the connection lifecycle.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for a single connection attempt.
    pub connect_timeout: Duration,
    /// Fixed delay before every reconnection attempt.
    pub reconnect_delay: Duration,
    /// Largest frame payload accepted from the gateway.
    pub max_frame_size: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// The gateway link and its state machine.
pub struct Connection {
    host: String,
    port: u16,
    config: ConnectionConfig,
    writer_config: WriterConfig,
    /// Present only while connected.
    writer: Mutex<Option<WriterHandle>>,
    running: AtomicBool,
    state: watch::Sender<ConnectionState>,
}

impl Connection {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        config: ConnectionConfig,
        writer_config: WriterConfig,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            host: host.into(),
            port,
            config,
            writer_config,
            writer: Mutex::new(None),
            running: AtomicBool::new(true),
            state,
        }
    }

    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current link state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch link state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// False once `stop()` has been called.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether a writer is installed and still alive.
    pub fn is_connected(&self) -> bool {
        self.writer_slot()
            .as_ref()
            .is_some_and(|writer| !writer.is_closed())
    }

    fn writer_slot(&self) -> MutexGuard<'_, Option<WriterHandle>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `next` unless already stopped.
    fn transition(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == ConnectionState::Stopped || *current == next {
                return false;
            }
            tracing::debug!("Connection state {:?} -> {:?}", current, next);
            *current = next;
            true
        });
    }

    /// Attempt one connection.
    ///
    /// On success the write half is handed to a fresh writer task and the
    /// read half is returned with that task's handle. Failures are logged
    /// here and leave the state at `Disconnected`.
    pub(crate) async fn connect(&self) -> Result<Link> {
        if !self.is_running() {
            return Err(GatewayError::NotConnected);
        }

        self.transition(ConnectionState::Connecting);

        let (reader, write_half) =
            match transport::connect(&self.host, self.port, self.config.connect_timeout).await {
                Ok(halves) => halves,
                Err(e) => {
                    tracing::error!(
                        "Connection to gateway at {}:{} failed: {}",
                        self.host,
                        self.port,
                        e
                    );
                    self.transition(ConnectionState::Disconnected);
                    return Err(e);
                }
            };

        let writer_task = {
            // Checked under the slot lock so a concurrent stop() cannot be missed
            let mut slot = self.writer_slot();
            if !self.is_running() {
                return Err(GatewayError::NotConnected);
            }
            let (handle, task) = spawn_writer_task(write_half, self.writer_config.clone());
            *slot = Some(handle);
            task
        };

        self.transition(ConnectionState::Connected);
        tracing::info!("Connected to gateway at {}:{}", self.host, self.port);
        Ok(Link {
            reader,
            writer_task,
        })
    }

    /// Drop the writer and move to `Disconnected`.
    pub(crate) fn disconnect(&self) {
        let had_writer = self.writer_slot().take().is_some();
        self.transition(ConnectionState::Disconnected);
        if had_writer {
            tracing::info!("Disconnected from gateway at {}:{}", self.host, self.port);
        }
    }

    /// Enter the terminal `Stopped` state. Idempotent.
    pub(crate) fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.writer_slot().take();
        self.state.send_modify(|state| *state = ConnectionState::Stopped);
        if was_running {
            tracing::info!("Gateway client for {}:{} stopped", self.host, self.port);
        }
    }

    /// Hand a frame to the writer task.
    ///
    /// Fails immediately with `NotConnected` when there is no link.
    pub(crate) async fn send(&self, frame: OutboundFrame) -> Result<()> {
        let writer = self.writer_slot().clone();
        match writer {
            Some(writer) => writer.send(frame).await,
            None => Err(GatewayError::NotConnected),
        }
    }

    /// Resolves once the connection has been stopped.
    pub(crate) async fn stopped(&self) {
        let mut rx = self.subscribe();
        // Only errs if the sender is gone, which cannot outlive `self`
        let _ = rx
            .wait_for(|state| *state == ConnectionState::Stopped)
            .await
            .map(|_| ());
    }

    /// Sleep for `delay`, returning `false` early if stopped meanwhile.
    pub(crate) async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => self.is_running(),
            _ = self.stopped() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::net::TcpListener;

    fn connection(port: u16) -> Connection {
        Connection::new(
            "127.0.0.1",
            port,
            ConnectionConfig::default(),
            WriterConfig::default(),
        )
    }

    #[test]
    fn test_config_default() {
        let config = ConnectionConfig::default();
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }

    #[tokio::test]
    async fn test_connect_transitions_to_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let conn = connection(listener.local_addr().unwrap().port());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let _link = conn.connect().await.unwrap();
        let _accepted = listener.accept().await.unwrap();

        assert_eq!(conn.state(), ConnectionState::Connected);
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_failed_connect_stays_disconnected() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let conn = connection(port);

        assert!(conn.connect().await.is_err());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_send_without_link_fails_immediately() {
        let conn = connection(1);
        let result = conn
            .send(OutboundFrame::new(Bytes::from_static(b"x")))
            .await;
        assert!(matches!(result, Err(GatewayError::NotConnected)));
    }

    #[tokio::test]
    async fn test_disconnect_drops_writer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let conn = connection(listener.local_addr().unwrap().port());
        let link = conn.connect().await.unwrap();

        conn.disconnect();

        // Dropping the last handle lets the writer task finish cleanly
        let finished = tokio::time::timeout(Duration::from_secs(1), link.writer_task)
            .await
            .unwrap()
            .unwrap();
        assert!(finished.is_ok());

        assert_eq!(conn.state(), ConnectionState::Disconnected);
        let result = conn
            .send(OutboundFrame::new(Bytes::from_static(b"x")))
            .await;
        assert!(matches!(result, Err(GatewayError::NotConnected)));
    }

    #[tokio::test]
    async fn test_stopped_is_terminal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let conn = connection(listener.local_addr().unwrap().port());

        conn.stop();
        assert_eq!(conn.state(), ConnectionState::Stopped);
        assert!(!conn.is_running());

        // No way out of Stopped
        conn.disconnect();
        assert_eq!(conn.state(), ConnectionState::Stopped);
        assert!(matches!(
            conn.connect().await,
            Err(GatewayError::NotConnected)
        ));
        assert_eq!(conn.state(), ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn test_pause_returns_early_on_stop() {
        let conn = std::sync::Arc::new(connection(1));

        let waiter = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.pause(Duration::from_secs(60)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        conn.stop();

        let resumed = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!resumed);
    }

    #[tokio::test]
    async fn test_pause_completes_while_running() {
        let conn = connection(1);
        assert!(conn.pause(Duration::from_millis(5)).await);
    }
}
