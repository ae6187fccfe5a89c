//! Response payloads.
//!
//! ```text
//! tag("RES"), reqId, ok:BOOL, hasValue:BOOL, [value], hasError:BOOL, [error]
//! ```
//!
//! The optional value and error are each guarded by the presence flag
//! written immediately before them.

use bytes::{Bytes, BytesMut};

use super::request::RequestId;
use super::wire_format::{put_bool, put_utf, PayloadReader, RESPONSE_TAG};
use crate::error::{GatewayError, Result};

/// A decoded response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub request_id: RequestId,
    pub ok: bool,
    pub value: Option<String>,
    pub error: Option<String>,
}

impl Response {
    /// Successful response, optionally carrying a value.
    pub fn success(request_id: RequestId, value: Option<String>) -> Self {
        Self {
            request_id,
            ok: true,
            value,
            error: None,
        }
    }

    /// Failed response carrying an error message.
    pub fn failure(request_id: RequestId, error: impl Into<String>) -> Self {
        Self {
            request_id,
            ok: false,
            value: None,
            error: Some(error.into()),
        }
    }

    /// Decode a response payload.
    ///
    /// Returns `Ok(None)` when the payload carries a tag other than `RES`;
    /// such frames are not addressed to the client and are discarded.
    pub fn decode(payload: &[u8]) -> Result<Option<Self>> {
        let mut reader = PayloadReader::new(payload);

        let tag = reader.read_utf()?;
        if tag != RESPONSE_TAG {
            return Ok(None);
        }

        let request_id = RequestId::from_wire(reader.read_utf()?);
        let ok = reader.read_bool()?;
        let value = reader.read_optional_utf()?;
        let error = reader.read_optional_utf()?;

        Ok(Some(Self {
            request_id,
            ok,
            value,
            error,
        }))
    }

    /// Encode the payload (without length prefix), as a gateway would.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(64);

        put_utf(&mut buf, RESPONSE_TAG)?;
        put_utf(&mut buf, self.request_id.as_str())?;
        put_bool(&mut buf, self.ok);
        put_bool(&mut buf, self.value.is_some());
        if let Some(value) = &self.value {
            put_utf(&mut buf, value)?;
        }
        put_bool(&mut buf, self.error.is_some());
        if let Some(error) = &self.error {
            put_utf(&mut buf, error)?;
        }

        Ok(buf.freeze())
    }

    /// Resolve as a GET/SEARCH outcome.
    pub fn into_value(self, default_error: &str) -> Result<Option<String>> {
        if self.ok {
            Ok(self.value)
        } else {
            Err(self.into_server_error(default_error))
        }
    }

    /// Resolve as a COUNT outcome.
    ///
    /// An absent value on success is an empty count. The value must be a
    /// plain 32-bit integer; surrounding whitespace or anything out of range
    /// is a decode failure.
    pub fn into_count(self, default_error: &str) -> Result<Option<i32>> {
        if !self.ok {
            return Err(self.into_server_error(default_error));
        }
        match self.value {
            None => Ok(None),
            Some(value) => value
                .parse::<i32>()
                .map(Some)
                .map_err(|_| GatewayError::InvalidCount(value)),
        }
    }

    /// Resolve as a SET/DELETE outcome.
    pub fn into_ack(self, default_error: &str) -> Result<()> {
        if self.ok {
            Ok(())
        } else {
            Err(self.into_server_error(default_error))
        }
    }

    fn into_server_error(self, default_error: &str) -> GatewayError {
        GatewayError::Server(self.error.unwrap_or_else(|| default_error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> RequestId {
        RequestId::from_wire("req-1")
    }

    #[test]
    fn test_encode_layout_value_only() {
        let response = Response::success(id(), Some("42".into()));
        let bytes = response.encode().unwrap();

        let mut expected = vec![0, 3, b'R', b'E', b'S', 0, 5];
        expected.extend_from_slice(b"req-1");
        expected.extend_from_slice(&[1, 1, 0, 2, b'4', b'2', 0]);

        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_decode_success_and_failure() {
        let ok = Response::success(id(), None);
        assert_eq!(Response::decode(&ok.encode().unwrap()).unwrap(), Some(ok));

        let failed = Response::failure(id(), "denied");
        assert_eq!(
            Response::decode(&failed.encode().unwrap()).unwrap(),
            Some(failed)
        );
    }

    #[test]
    fn test_decode_foreign_tag_is_none() {
        let mut payload = vec![0, 3];
        payload.extend_from_slice(b"PUB");
        payload.extend_from_slice(&[0, 1, b'x']);
        assert_eq!(Response::decode(&payload).unwrap(), None);
    }

    #[test]
    fn test_decode_truncated_is_error() {
        let bytes = Response::success(id(), Some("value".into()))
            .encode()
            .unwrap();
        assert!(Response::decode(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn test_into_value() {
        let value = Response::success(id(), Some("{}".into())).into_value("Get request failed");
        assert_eq!(value.unwrap(), Some("{}".to_string()));

        let empty = Response::success(id(), None).into_value("Get request failed");
        assert_eq!(empty.unwrap(), None);
    }

    #[test]
    fn test_server_error_message_and_default() {
        let err = Response::failure(id(), "no such namespace")
            .into_value("Get request failed")
            .unwrap_err();
        assert!(matches!(err, GatewayError::Server(ref m) if m == "no such namespace"));

        let bare = Response {
            request_id: id(),
            ok: false,
            value: None,
            error: None,
        };
        let err = bare.into_ack("Set request failed").unwrap_err();
        assert!(matches!(err, GatewayError::Server(ref m) if m == "Set request failed"));
    }

    #[test]
    fn test_into_count() {
        let count = Response::success(id(), Some("42".into())).into_count("Count request failed");
        assert_eq!(count.unwrap(), Some(42));

        let empty = Response::success(id(), None).into_count("Count request failed");
        assert_eq!(empty.unwrap(), None);

        let bad = Response::success(id(), Some("abc".into())).into_count("Count request failed");
        assert!(matches!(bad, Err(GatewayError::InvalidCount(ref v)) if v == "abc"));

        let negative = Response::success(id(), Some("-7".into())).into_count("Count request failed");
        assert_eq!(negative.unwrap(), Some(-7));
    }

    #[test]
    fn test_into_count_is_strict_32_bit() {
        for value in [" 42", "42\n", "3000000000", "+"] {
            let result = Response::success(id(), Some(value.into())).into_count("Count request failed");
            assert!(
                matches!(result, Err(GatewayError::InvalidCount(ref v)) if v == value),
                "{:?} should be rejected",
                value
            );
        }
        let max = Response::success(id(), Some("2147483647".into())).into_count("Count request failed");
        assert_eq!(max.unwrap(), Some(i32::MAX));
    }
}
