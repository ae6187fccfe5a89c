//! Pending-request tables.
//!
//! Every correlated request parks a one-shot completion handle here, keyed
//! by its [`RequestId`], until the dispatcher sees the matching response.
//! Exactly-once resolution is enforced at this boundary: an entry is
//! removed from the map *before* its handle is completed, so a duplicate or
//! late response for the same identifier finds nothing and is dropped.
//!
//! Each category gets its own table and its own lock. The lock is held only
//! for the map insert or removal, never while a handle is completed.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{GatewayError, Result};
use crate::protocol::RequestId;

type Sender<T> = oneshot::Sender<Result<T>>;

/// Caller-side view of one in-flight request.
///
/// Resolves exactly once with the gateway's answer. Dropping the handle
/// does not remove the table entry; the response, if it ever arrives, is
/// discarded.
#[must_use = "a response handle does nothing unless awaited"]
pub struct ResponseHandle<T> {
    request_id: RequestId,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> ResponseHandle<T> {
    /// Identifier the request was sent with.
    #[inline]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Wait for the response with a deadline.
    ///
    /// On timeout the request stays registered; the client never expires
    /// pending requests on its own.
    pub async fn with_timeout(self, timeout: Duration) -> Result<T> {
        match tokio::time::timeout(timeout, self).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
    }
}

impl<T> Future for ResponseHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(GatewayError::Canceled)))
    }
}

/// Map from request identifier to completion handle for one category.
pub struct PendingTable<T> {
    name: &'static str,
    entries: Mutex<HashMap<RequestId, Sender<T>>>,
}

impl<T> PendingTable<T> {
    /// Create an empty table. `name` is used in log messages.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Sender<T>>> {
        // Entries stay consistent even if a holder panicked mid-insert.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Category name of this table.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a new request and return the caller's handle.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateRequestId` if the identifier is already pending.
    pub fn register(&self, request_id: &RequestId) -> Result<ResponseHandle<T>> {
        let (tx, rx) = oneshot::channel();

        let mut entries = self.lock();
        if entries.contains_key(request_id) {
            return Err(GatewayError::DuplicateRequestId(request_id.to_string()));
        }
        entries.insert(request_id.clone(), tx);

        Ok(ResponseHandle {
            request_id: request_id.clone(),
            rx,
        })
    }

    /// Withdraw a registration without completing it.
    ///
    /// Returns `true` if the identifier was pending.
    pub fn remove(&self, request_id: &RequestId) -> bool {
        self.lock().remove(request_id).is_some()
    }

    /// Complete a pending request.
    ///
    /// Returns `true` if the identifier was pending. Unknown identifiers are
    /// a no-op.
    pub fn resolve(&self, request_id: &RequestId, outcome: Result<T>) -> bool {
        self.resolve_with(request_id, || outcome)
    }

    /// Complete a pending request with a lazily computed outcome.
    ///
    /// `outcome` only runs when the identifier is found.
    pub fn resolve_with<F>(&self, request_id: &RequestId, outcome: F) -> bool
    where
        F: FnOnce() -> Result<T>,
    {
        let Some(tx) = self.lock().remove(request_id) else {
            return false;
        };

        if tx.send(outcome()).is_err() {
            tracing::debug!(
                "Caller dropped {} request {} before its response arrived",
                self.name,
                request_id
            );
        }
        true
    }

    /// Whether the identifier is pending in this table.
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.lock().contains_key(request_id)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Category a pending request was registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// GET and SEARCH.
    Lookup,
    Count,
    Write,
    Delete,
}

/// The four per-category tables shared by callers and the dispatcher.
pub struct PendingRequests {
    pub lookups: PendingTable<Option<String>>,
    pub counts: PendingTable<Option<i32>>,
    pub writes: PendingTable<()>,
    pub deletes: PendingTable<()>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            lookups: PendingTable::new("lookup"),
            counts: PendingTable::new("count"),
            writes: PendingTable::new("write"),
            deletes: PendingTable::new("delete"),
        }
    }

    /// Category an identifier is pending under, probing in routing order.
    pub fn kind_of(&self, request_id: &RequestId) -> Option<RequestKind> {
        if self.lookups.contains(request_id) {
            Some(RequestKind::Lookup)
        } else if self.counts.contains(request_id) {
            Some(RequestKind::Count)
        } else if self.writes.contains(request_id) {
            Some(RequestKind::Write)
        } else if self.deletes.contains(request_id) {
            Some(RequestKind::Delete)
        } else {
            None
        }
    }

    /// Total pending requests across all categories.
    pub fn len(&self) -> usize {
        self.lookups.len() + self.counts.len() + self.writes.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
