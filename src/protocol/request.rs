//! Request payloads.
//!
//! Every request starts with the same five UTF fields:
//! ```text
//! op, reqId, db, secret, ns, <operation fields>
//! ```
//!
//! followed by the operation-specific fields:
//!
//! | op       | fields                                                  |
//! |----------|---------------------------------------------------------|
//! | GET      | key                                                     |
//! | SEARCH   | filters:MAP, selections:MAP, limit:INT, offset:INT      |
//! | COUNT    | filters:MAP, limit:INT, offset:INT                      |
//! | SET      | key, json                                               |
//! | DELETE   | key                                                     |
//! | REGISTER | typeName, fieldCount:INT, (alias, jsonPath, sqlType)*   |

use std::collections::BTreeMap;
use std::fmt;

use bytes::{Bytes, BytesMut};

use super::wire_format::{put_count, put_i32, put_map, put_utf, PayloadReader};
use crate::error::{GatewayError, Result};

/// Default result limit for searches and counts.
pub const DEFAULT_LIMIT: i32 = 1000;

/// Filter or selection map sent with searches and counts.
pub type FieldMap = BTreeMap<String, String>;

/// Opaque correlation token for one in-flight request.
///
/// Rendered as a hyphenated UUID v4 string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(String);

impl RequestId {
    /// Mint a fresh random identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an identifier received from the wire.
    pub fn from_wire(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operation tag written as the first field of every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Search,
    Count,
    Set,
    Delete,
    Register,
}

impl Operation {
    /// Wire tag for this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "GET",
            Operation::Search => "SEARCH",
            Operation::Count => "COUNT",
            Operation::Set => "SET",
            Operation::Delete => "DELETE",
            Operation::Register => "REGISTER",
        }
    }

    /// Parse a wire tag.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "GET" => Some(Operation::Get),
            "SEARCH" => Some(Operation::Search),
            "COUNT" => Some(Operation::Count),
            "SET" => Some(Operation::Set),
            "DELETE" => Some(Operation::Delete),
            "REGISTER" => Some(Operation::Register),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database, shared secret and namespace carried by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    pub database: String,
    pub secret: String,
    pub namespace: String,
}

impl RequestScope {
    pub fn new(
        database: impl Into<String>,
        secret: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            secret: secret.into(),
            namespace: namespace.into(),
        }
    }

    /// Same database and secret, different namespace.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            database: self.database.clone(),
            secret: self.secret.clone(),
            namespace: namespace.into(),
        }
    }
}

/// Filtered search parameters.
///
/// Defaults to no filters, no selections, `limit = 1000`, `offset = 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub filters: FieldMap,
    pub selections: FieldMap,
    pub limit: i32,
    pub offset: i32,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self {
            filters: FieldMap::new(),
            selections: FieldMap::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Add a filter entry.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Add a selection entry.
    pub fn select(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.selections.insert(key.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Schema metadata for one field alias of a registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelField {
    /// JSON path of the value inside stored documents.
    pub json_path: String,
    /// Column type the gateway should project the value into.
    pub sql_type: String,
}

impl ModelField {
    pub fn new(json_path: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            json_path: json_path.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// Operation-specific request fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Get {
        key: String,
    },
    Search {
        filters: FieldMap,
        selections: FieldMap,
        limit: i32,
        offset: i32,
    },
    Count {
        filters: FieldMap,
        limit: i32,
        offset: i32,
    },
    Set {
        key: String,
        json: String,
    },
    Delete {
        key: String,
    },
    Register {
        type_name: String,
        fields: BTreeMap<String, ModelField>,
    },
}

impl RequestBody {
    /// Operation tag for this body.
    pub fn operation(&self) -> Operation {
        match self {
            RequestBody::Get { .. } => Operation::Get,
            RequestBody::Search { .. } => Operation::Search,
            RequestBody::Count { .. } => Operation::Count,
            RequestBody::Set { .. } => Operation::Set,
            RequestBody::Delete { .. } => Operation::Delete,
            RequestBody::Register { .. } => Operation::Register,
        }
    }
}

/// A complete request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_id: RequestId,
    pub scope: RequestScope,
    pub body: RequestBody,
}

impl Request {
    /// Create a request with a freshly minted identifier.
    pub fn new(scope: RequestScope, body: RequestBody) -> Self {
        Self {
            request_id: RequestId::new(),
            scope,
            body,
        }
    }

    #[inline]
    pub fn operation(&self) -> Operation {
        self.body.operation()
    }

    /// Encode the payload (without length prefix).
    ///
    /// # Errors
    ///
    /// Returns `StringTooLong` if any string field exceeds the wire limit.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(128);

        put_utf(&mut buf, self.operation().as_str())?;
        put_utf(&mut buf, self.request_id.as_str())?;
        put_utf(&mut buf, &self.scope.database)?;
        put_utf(&mut buf, &self.scope.secret)?;
        put_utf(&mut buf, &self.scope.namespace)?;

        match &self.body {
            RequestBody::Get { key } | RequestBody::Delete { key } => {
                put_utf(&mut buf, key)?;
            }
            RequestBody::Search {
                filters,
                selections,
                limit,
                offset,
            } => {
                put_map(&mut buf, filters)?;
                put_map(&mut buf, selections)?;
                put_i32(&mut buf, *limit);
                put_i32(&mut buf, *offset);
            }
            RequestBody::Count {
                filters,
                limit,
                offset,
            } => {
                put_map(&mut buf, filters)?;
                put_i32(&mut buf, *limit);
                put_i32(&mut buf, *offset);
            }
            RequestBody::Set { key, json } => {
                put_utf(&mut buf, key)?;
                put_utf(&mut buf, json)?;
            }
            RequestBody::Register { type_name, fields } => {
                put_utf(&mut buf, type_name)?;
                put_count(&mut buf, fields.len())?;
                for (alias, field) in fields {
                    put_utf(&mut buf, alias)?;
                    put_utf(&mut buf, &field.json_path)?;
                    put_utf(&mut buf, &field.sql_type)?;
                }
            }
        }

        Ok(buf.freeze())
    }

    /// Decode a request payload, as a gateway would.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);

        let tag = reader.read_utf()?;
        let operation = Operation::parse(&tag)
            .ok_or_else(|| GatewayError::Protocol(format!("Unknown operation: {}", tag)))?;
        let request_id = RequestId::from_wire(reader.read_utf()?);
        let database = reader.read_utf()?;
        let secret = reader.read_utf()?;
        let namespace = reader.read_utf()?;

        let body = match operation {
            Operation::Get => RequestBody::Get {
                key: reader.read_utf()?,
            },
            Operation::Search => RequestBody::Search {
                filters: reader.read_map()?,
                selections: reader.read_map()?,
                limit: reader.read_i32()?,
                offset: reader.read_i32()?,
            },
            Operation::Count => RequestBody::Count {
                filters: reader.read_map()?,
                limit: reader.read_i32()?,
                offset: reader.read_i32()?,
            },
            Operation::Set => RequestBody::Set {
                key: reader.read_utf()?,
                json: reader.read_utf()?,
            },
            Operation::Delete => RequestBody::Delete {
                key: reader.read_utf()?,
            },
            Operation::Register => {
                let type_name = reader.read_utf()?;
                let count = reader.read_count()?;
                let mut fields = BTreeMap::new();
                for _ in 0..count {
                    let alias = reader.read_utf()?;
                    let json_path = reader.read_utf()?;
                    let sql_type = reader.read_utf()?;
                    fields.insert(alias, ModelField { json_path, sql_type });
                }
                RequestBody::Register { type_name, fields }
            }
        };

        if reader.remaining() != 0 {
            return Err(GatewayError::Protocol(format!(
                "{} trailing bytes after {} request",
                reader.remaining(),
                operation
            )));
        }

        Ok(Self {
            request_id,
            scope: RequestScope {
                database,
                secret,
                namespace,
            },
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> RequestScope {
        RequestScope::new("main", "s3cret", "players")
    }

    fn utf(s: &str) -> Vec<u8> {
        let mut v = (s.len() as u16).to_be_bytes().to_vec();
        v.extend_from_slice(s.as_bytes());
        v
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_operation_tags() {
        for op in [
            Operation::Get,
            Operation::Search,
            Operation::Count,
            Operation::Set,
            Operation::Delete,
            Operation::Register,
        ] {
            assert_eq!(Operation::parse(op.as_str()), Some(op));
        }
        assert_eq!(Operation::parse("RES"), None);
    }

    #[test]
    fn test_get_layout() {
        let mut request = Request::new(
            scope(),
            RequestBody::Get {
                key: "alice".into(),
            },
        );
        request.request_id = RequestId::from_wire("r1");

        let mut expected = Vec::new();
        for field in ["GET", "r1", "main", "s3cret", "players", "alice"] {
            expected.extend(utf(field));
        }

        assert_eq!(&request.encode().unwrap()[..], &expected[..]);
    }

    #[test]
    fn test_search_layout_single_filter() {
        let query = SearchQuery::new().filter("mode", "ALL");
        let mut request = Request::new(
            scope(),
            RequestBody::Search {
                filters: query.filters,
                selections: query.selections,
                limit: query.limit,
                offset: query.offset,
            },
        );
        request.request_id = RequestId::from_wire("r2");

        let mut expected = Vec::new();
        for field in ["SEARCH", "r2", "main", "s3cret", "players"] {
            expected.extend(utf(field));
        }
        expected.extend(1i32.to_be_bytes());
        expected.extend(utf("mode"));
        expected.extend(utf("ALL"));
        expected.extend(0i32.to_be_bytes());
        expected.extend(1000i32.to_be_bytes());
        expected.extend(0i32.to_be_bytes());

        assert_eq!(&request.encode().unwrap()[..], &expected[..]);
    }

    #[test]
    fn test_register_layout() {
        let mut fields = BTreeMap::new();
        fields.insert("balance".to_string(), ModelField::new("$.balance", "DOUBLE"));
        let mut request = Request::new(
            scope(),
            RequestBody::Register {
                type_name: "Account".into(),
                fields,
            },
        );
        request.request_id = RequestId::from_wire("r3");

        let mut expected = Vec::new();
        for field in ["REGISTER", "r3", "main", "s3cret", "players", "Account"] {
            expected.extend(utf(field));
        }
        expected.extend(1i32.to_be_bytes());
        for field in ["balance", "$.balance", "DOUBLE"] {
            expected.extend(utf(field));
        }

        assert_eq!(&request.encode().unwrap()[..], &expected[..]);
    }

    #[test]
    fn test_decode_reproduces_every_operation() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), ModelField::new("$.name", "VARCHAR(64)"));
        fields.insert("level".to_string(), ModelField::new("$.level", "INT"));

        let bodies = vec![
            RequestBody::Get { key: "k".into() },
            RequestBody::Search {
                filters: FieldMap::new(),
                selections: FieldMap::new(),
                limit: 0,
                offset: 0,
            },
            RequestBody::Search {
                filters: SearchQuery::new().filter("a", "1").filter("b", "2").filters,
                selections: SearchQuery::new().select("name", "$.name").selections,
                limit: 25,
                offset: 50,
            },
            RequestBody::Count {
                filters: FieldMap::new(),
                limit: 0,
                offset: 0,
            },
            RequestBody::Set {
                key: "k".into(),
                json: r#"{"balance":10.5}"#.into(),
            },
            RequestBody::Delete { key: "".into() },
            RequestBody::Register {
                type_name: "Player".into(),
                fields,
            },
        ];

        for body in bodies {
            let request = Request::new(scope(), body);
            let decoded = Request::decode(&request.encode().unwrap()).unwrap();
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn test_decode_unknown_operation() {
        let mut payload = Vec::new();
        for field in ["PING", "r", "db", "s", "ns"] {
            payload.extend(utf(field));
        }
        let err = Request::decode(&payload).unwrap_err();
        assert!(err.to_string().contains("Unknown operation"));
    }

    #[test]
    fn test_decode_trailing_bytes_rejected() {
        let request = Request::new(scope(), RequestBody::Delete { key: "k".into() });
        let mut payload = request.encode().unwrap().to_vec();
        payload.push(0);
        assert!(Request::decode(&payload).is_err());
    }

    #[test]
    fn test_encode_rejects_oversized_json() {
        let request = Request::new(
            scope(),
            RequestBody::Set {
                key: "k".into(),
                json: "x".repeat(70_000),
            },
        );
        assert!(matches!(
            request.encode(),
            Err(GatewayError::StringTooLong(70_000))
        ));
    }

    #[test]
    fn test_scope_with_namespace() {
        let other = scope().with_namespace("guilds");
        assert_eq!(other.database, "main");
        assert_eq!(other.secret, "s3cret");
        assert_eq!(other.namespace, "guilds");
    }

    #[test]
    fn test_search_query_defaults() {
        let query = SearchQuery::default();
        assert!(query.filters.is_empty());
        assert!(query.selections.is_empty());
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(query.offset, 0);
    }
}
