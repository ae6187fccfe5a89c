//! Scope-bound operation handle with typed JSON helpers.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::GatewayClient;
use crate::codec::JsonCodec;
use crate::error::Result;
use crate::pending::ResponseHandle;
use crate::protocol::{ModelField, RequestScope, SearchQuery};

/// A [`GatewayClient`] bound to one database, secret and namespace.
///
/// The raw methods mirror the client's operations. The `*_json` helpers
/// await the response and convert documents with [`JsonCodec`].
#[derive(Clone)]
pub struct Namespace {
    client: GatewayClient,
    scope: RequestScope,
}

impl Namespace {
    pub fn new(client: GatewayClient, scope: RequestScope) -> Self {
        Self { client, scope }
    }

    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// Same client and credentials, another namespace.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            scope: self.scope.with_namespace(namespace),
        }
    }

    pub async fn get(&self, key: &str) -> Result<ResponseHandle<Option<String>>> {
        self.client.get_by_key(&self.scope, key).await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<ResponseHandle<Option<String>>> {
        self.client.search(&self.scope, query).await
    }

    /// Count with the query's filters, limit and offset. Selections are
    /// ignored.
    pub async fn count(&self, query: &SearchQuery) -> Result<ResponseHandle<Option<i32>>> {
        self.client
            .count(&self.scope, &query.filters, query.limit, query.offset)
            .await
    }

    pub async fn set(&self, key: &str, json: &str) -> Result<ResponseHandle<()>> {
        self.client.write(&self.scope, key, json).await
    }

    pub async fn delete(&self, key: &str) -> Result<ResponseHandle<()>> {
        self.client.delete(&self.scope, key).await
    }

    pub async fn register_schema(&self, type_name: &str, fields: &BTreeMap<String, ModelField>) {
        self.client
            .register_schema(&self.scope, type_name, fields)
            .await
    }

    /// Fetch and decode one document.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let json = self.get(key).await?.await?;
        JsonCodec::decode_optional(json.as_deref())
    }

    /// Search and decode the result list. No result is an empty list.
    pub async fn search_json<T: DeserializeOwned>(&self, query: &SearchQuery) -> Result<Vec<T>> {
        let json = self.search(query).await?.await?;
        JsonCodec::decode_list(json.as_deref())
    }

    /// Encode and store a document.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<ResponseHandle<()>> {
        let json = JsonCodec::encode(value)?;
        self.set(key, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    #[test]
    fn test_with_namespace_keeps_credentials() {
        let client = GatewayClient::new("127.0.0.1", 1);
        let users = client.namespace("main", "s3cret", "users");
        let orders = users.with_namespace("orders");

        assert_eq!(orders.scope(), &RequestScope::new("main", "s3cret", "orders"));
        assert_eq!(users.scope().namespace, "users");
    }

    #[tokio::test]
    async fn test_set_json_without_link() {
        let client = GatewayClient::new("127.0.0.1", 1);
        let ns = client.namespace("main", "s3cret", "users");

        let result = ns.set_json("alice", &serde_json::json!({"age": 30})).await;

        assert!(matches!(result, Err(GatewayError::NotConnected)));
        assert_eq!(client.pending_requests(), 0);
    }
}
