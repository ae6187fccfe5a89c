//! JSON codec using `serde_json`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// JSON codec for stored documents.
///
/// Codecs are marker structs with static methods rather than trait objects.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to a compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode a JSON string to a value.
    #[inline]
    pub fn decode<T: DeserializeOwned>(json: &str) -> Result<T> {
        Ok(serde_json::from_str(json)?)
    }

    /// Decode an optional document; `None` stays `None`.
    pub fn decode_optional<T: DeserializeOwned>(json: Option<&str>) -> Result<Option<T>> {
        json.map(Self::decode::<T>).transpose()
    }

    /// Decode a SEARCH result. An absent result is an empty list.
    pub fn decode_list<T: DeserializeOwned>(json: Option<&str>) -> Result<Vec<T>> {
        match json {
            Some(json) => Self::decode(json),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Account {
        owner: String,
        balance: f64,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = Account {
            owner: "alice".to_string(),
            balance: 10.5,
        };

        let encoded = JsonCodec::encode(&original).unwrap();
        assert_eq!(encoded, r#"{"owner":"alice","balance":10.5}"#);

        let decoded: Account = JsonCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_optional() {
        let none: Option<Account> = JsonCodec::decode_optional(None).unwrap();
        assert!(none.is_none());

        let some: Option<Account> =
            JsonCodec::decode_optional(Some(r#"{"owner":"bob","balance":0.0}"#)).unwrap();
        assert_eq!(some.unwrap().owner, "bob");
    }

    #[test]
    fn test_decode_list() {
        let accounts: Vec<Account> = JsonCodec::decode_list(Some(
            r#"[{"owner":"a","balance":1.0},{"owner":"b","balance":2.0}]"#,
        ))
        .unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].owner, "b");

        let empty: Vec<Account> = JsonCodec::decode_list(None).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_decode_invalid_json() {
        let result: Result<Account> = JsonCodec::decode("not json");
        assert!(matches!(result, Err(GatewayError::Json(_))));
    }
}
