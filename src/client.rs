//! Client builder and operation API.
//!
//! The [`ClientBuilder`] configures the link and the writer; the
//! [`GatewayClient`] owns the connection, the pending tables and the
//! dispatcher task. Its lifecycle:
//! 1. Attempt the initial connection (failure only schedules a retry)
//! 2. Spawn the dispatcher, which reads responses and reconnects
//! 3. Operations register a handle, encode, and hand the frame to the writer
//! 4. `stop()` enters the terminal state and joins the dispatcher
//!
//! # Example
//!
//! ```ignore
//! use sgw_client::{GatewayClient, RequestScope};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GatewayClient::builder("127.0.0.1", 7070)
//!         .reconnect_delay(std::time::Duration::from_secs(1))
//!         .start()
//!         .await?;
//!
//!     let scope = RequestScope::new("main", "s3cret", "accounts");
//!     client.write(&scope, "alice", r#"{"balance":10}"#).await?.await?;
//!     let doc = client.get_by_key(&scope, "alice").await?.await?;
//!     println!("{:?}", doc);
//!
//!     client.stop().await;
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::connection::{Connection, ConnectionConfig, ConnectionState};
use crate::dispatcher;
use crate::error::{GatewayError, Result};
use crate::namespace::Namespace;
use crate::pending::{PendingRequests, PendingTable, ResponseHandle};
use crate::protocol::{FieldMap, ModelField, Request, RequestBody, RequestScope, SearchQuery};
use crate::writer::{OutboundFrame, WriterConfig};

/// Builder for configuring and starting a gateway client.
pub struct ClientBuilder {
    host: String,
    port: u16,
    connection_config: ConnectionConfig,
    writer_config: WriterConfig,
}

impl ClientBuilder {
    /// Create a builder for the gateway at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connection_config: ConnectionConfig::default(),
            writer_config: WriterConfig::default(),
        }
    }

    /// Set the timeout for a single connection attempt.
    ///
    /// Default: 5 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connection_config.connect_timeout = timeout;
        self
    }

    /// Set the fixed delay between a link failure and the next attempt.
    ///
    /// Default: 2 seconds
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.connection_config.reconnect_delay = delay;
        self
    }

    /// Set the largest response payload accepted from the gateway.
    ///
    /// Default: 16 MiB
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.connection_config.max_frame_size = size;
        self
    }

    /// Set the maximum pending frames for backpressure.
    ///
    /// When this limit is reached, operations wait until backpressure
    /// clears or the backpressure timeout elapses.
    /// Default: 1024
    pub fn max_pending_frames(mut self, limit: usize) -> Self {
        self.writer_config.max_pending_frames = limit;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.writer_config.channel_capacity = capacity;
        self
    }

    /// Set the backpressure timeout.
    ///
    /// Default: 5 seconds
    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.writer_config.backpressure_timeout = timeout;
        self
    }

    /// Build the client without connecting.
    pub fn build(self) -> GatewayClient {
        GatewayClient::with_config(
            self.host,
            self.port,
            self.connection_config,
            self.writer_config,
        )
    }

    /// Build and start the client.
    ///
    /// An unreachable gateway is not an error here; the dispatcher keeps
    /// retrying in the background.
    pub async fn start(self) -> Result<GatewayClient> {
        let client = self.build();
        client.start().await?;
        Ok(client)
    }
}

struct ClientInner {
    connection: Arc<Connection>,
    pending: Arc<PendingRequests>,
    started: AtomicBool,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // Lets a still-running dispatcher exit and release the pending tables
        self.connection.stop();
    }
}

/// Handle to a gateway client. Cheap to clone; clones share one link.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<ClientInner>,
}

impl GatewayClient {
    /// Create a new client builder.
    pub fn builder(host: impl Into<String>, port: u16) -> ClientBuilder {
        ClientBuilder::new(host, port)
    }

    /// Client with default configuration. Call [`start`](Self::start) next.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ClientBuilder::new(host, port).build()
    }

    fn with_config(
        host: String,
        port: u16,
        connection_config: ConnectionConfig,
        writer_config: WriterConfig,
    ) -> Self {
        let connection = Connection::new(host, port, connection_config, writer_config);
        Self {
            inner: Arc::new(ClientInner {
                connection: Arc::new(connection),
                pending: Arc::new(PendingRequests::new()),
                started: AtomicBool::new(false),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// Connect and launch the dispatcher.
    ///
    /// A failed initial connection is logged and retried after the reconnect
    /// delay. Calling `start` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the client was already stopped.
    pub async fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.connection.is_running() {
            return Err(GatewayError::ConnectionClosed);
        }
        if inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let link = inner.connection.connect().await.ok();

        let handle = tokio::spawn(dispatcher::run(
            inner.connection.clone(),
            inner.pending.clone(),
            link,
        ));
        *inner
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);

        Ok(())
    }

    /// Stop the client and wait for the dispatcher to exit.
    ///
    /// Pending handles are not resolved; they fail with `Canceled` once the
    /// last clone of the client is dropped.
    pub async fn stop(&self) {
        self.inner.connection.stop();

        let handle = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Dispatcher task failed: {}", e);
            }
        }
    }

    /// Current link state.
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Watch link state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    /// Whether a live link is available for sending.
    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// Requests awaiting a response, across all categories.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Handle bound to one database, secret and namespace.
    pub fn namespace(
        &self,
        database: impl Into<String>,
        secret: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Namespace {
        Namespace::new(
            self.clone(),
            RequestScope::new(database, secret, namespace),
        )
    }

    /// Fetch one document by key.
    pub async fn get_by_key(
        &self,
        scope: &RequestScope,
        key: &str,
    ) -> Result<ResponseHandle<Option<String>>> {
        let request = Request::new(
            scope.clone(),
            RequestBody::Get {
                key: key.to_string(),
            },
        );
        self.submit(&self.inner.pending.lookups, request).await
    }

    /// Run a filtered search. Resolves with the raw JSON list, if any.
    pub async fn search(
        &self,
        scope: &RequestScope,
        query: &SearchQuery,
    ) -> Result<ResponseHandle<Option<String>>> {
        let request = Request::new(
            scope.clone(),
            RequestBody::Search {
                filters: query.filters.clone(),
                selections: query.selections.clone(),
                limit: query.limit,
                offset: query.offset,
            },
        );
        self.submit(&self.inner.pending.lookups, request).await
    }

    /// Count documents matching `filters`.
    pub async fn count(
        &self,
        scope: &RequestScope,
        filters: &FieldMap,
        limit: i32,
        offset: i32,
    ) -> Result<ResponseHandle<Option<i32>>> {
        let request = Request::new(
            scope.clone(),
            RequestBody::Count {
                filters: filters.clone(),
                limit,
                offset,
            },
        );
        self.submit(&self.inner.pending.counts, request).await
    }

    /// Store a JSON document under `key`.
    pub async fn write(
        &self,
        scope: &RequestScope,
        key: &str,
        json: &str,
    ) -> Result<ResponseHandle<()>> {
        let request = Request::new(
            scope.clone(),
            RequestBody::Set {
                key: key.to_string(),
                json: json.to_string(),
            },
        );
        self.submit(&self.inner.pending.writes, request).await
    }

    /// Delete the document stored under `key`.
    pub async fn delete(&self, scope: &RequestScope, key: &str) -> Result<ResponseHandle<()>> {
        let request = Request::new(
            scope.clone(),
            RequestBody::Delete {
                key: key.to_string(),
            },
        );
        self.submit(&self.inner.pending.deletes, request).await
    }

    /// Announce a document type and its queryable fields.
    ///
    /// Fire-and-forget: nothing waits for the gateway's answer and failures
    /// are only logged.
    pub async fn register_schema(
        &self,
        scope: &RequestScope,
        type_name: &str,
        fields: &BTreeMap<String, ModelField>,
    ) {
        let request = Request::new(
            scope.clone(),
            RequestBody::Register {
                type_name: type_name.to_string(),
                fields: fields.clone(),
            },
        );

        let result = match request.encode() {
            Ok(payload) => self.inner.connection.send(OutboundFrame::new(payload)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(
                "Failed to register type {} in namespace {}: {}",
                type_name,
                scope.namespace,
                e
            );
        }
    }

    /// Register, encode and send; undo the registration on failure.
    async fn submit<T>(
        &self,
        table: &PendingTable<T>,
        request: Request,
    ) -> Result<ResponseHandle<T>> {
        let handle = table.register(&request.request_id)?;

        let sent = match request.encode() {
            Ok(payload) => self.inner.connection.send(OutboundFrame::new(payload)).await,
            Err(e) => Err(e),
        };

        match sent {
            Ok(()) => Ok(handle),
            Err(e) => {
                table.remove(&request.request_id);
                tracing::debug!(
                    "{} request {} not sent: {}",
                    request.operation(),
                    request.request_id,
                    e
                );
                Err(e)
            }
        }
    }
}
