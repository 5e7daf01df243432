use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{ResponseType, TransportResponse};

/// Decoded body of an accepted response.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedBody {
    Json(serde_json::Value),
    Text(String),
    /// Binary payload with its declared content type.
    Blob { content_type: String, data: Bytes },
    /// Raw bytes of a response whose format was not recognized.
    Bytes(Bytes),
}

impl ParsedBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Raw bytes of a binary or unrecognized body.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Blob { data, .. } | Self::Bytes(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        match self {
            Self::Json(value) => serde_json::from_value(value),
            Self::Text(text) => serde_json::from_str(&text),
            Self::Blob { data, .. } | Self::Bytes(data) => serde_json::from_slice(&data),
        }
    }
}

/// Diagnostic payload extracted from a rejected response.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorPayload {
    Json(serde_json::Value),
    Text(String),
}

/// Decodes an accepted response according to `response_type`.
///
/// With [`ResponseType::Auto`] the declared content type picks the format.
/// Precedence: json, then text, then octet-stream/blob, then raw bytes.
/// An empty JSON body decodes to `null`.
pub fn parse_success(
    response: &TransportResponse,
    response_type: ResponseType,
) -> Result<ParsedBody, serde_json::Error> {
    let declared = response.content_type().to_ascii_lowercase();
    let format = match response_type {
        ResponseType::Auto => declared.as_str(),
        explicit => explicit.as_str(),
    };

    if format.contains("json") {
        if response.body.is_empty() {
            return Ok(ParsedBody::Json(serde_json::Value::Null));
        }
        serde_json::from_slice(&response.body).map(ParsedBody::Json)
    } else if format.contains("text") {
        Ok(ParsedBody::Text(
            String::from_utf8_lossy(&response.body).into_owned(),
        ))
    } else if format.contains("octet-stream") || response_type == ResponseType::Blob {
        Ok(ParsedBody::Blob {
            content_type: response.content_type().to_owned(),
            data: response.body.clone(),
        })
    } else {
        Ok(ParsedBody::Bytes(response.body.clone()))
    }
}

/// Extracts whatever diagnostic payload a rejected response carries.
///
/// Tries JSON, then UTF-8 text. Empty or undecodable bodies yield `None`.
pub fn parse_failure(response: &TransportResponse) -> Option<ErrorPayload> {
    if response.body.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_slice(&response.body) {
        return Some(ErrorPayload::Json(value));
    }
    std::str::from_utf8(&response.body)
        .ok()
        .map(|text| ErrorPayload::Text(text.to_owned()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_failure, parse_success, ErrorPayload, ParsedBody};
    use crate::{ResponseType, TransportResponse};

    fn response(content_type: &str, body: &'static [u8]) -> TransportResponse {
        TransportResponse::new(200)
            .with_header("content-type", content_type)
            .with_body(body)
    }

    #[test]
    fn auto_decodes_json_content_type() {
        let res = response("application/json; charset=utf-8", br#"{"ok":true}"#);
        let parsed = parse_success(&res, ResponseType::Auto).expect("valid json");
        assert_eq!(parsed, ParsedBody::Json(json!({"ok": true})));
    }

    #[test]
    fn auto_decodes_text_content_type() {
        let res = response("text/plain", b"hello");
        let parsed = parse_success(&res, ResponseType::Auto).expect("text never fails");
        assert_eq!(parsed, ParsedBody::Text("hello".to_owned()));
    }

    #[test]
    fn auto_decodes_octet_stream_as_blob() {
        let res = response("application/octet-stream", &[1, 2, 3]);
        let parsed = parse_success(&res, ResponseType::Auto).expect("blob never fails");
        assert_eq!(
            parsed,
            ParsedBody::Blob {
                content_type: "application/octet-stream".to_owned(),
                data: vec![1u8, 2, 3].into(),
            }
        );
    }

    #[test]
    fn unknown_or_missing_content_type_is_raw_bytes() {
        let res = response("image/png", &[137, 80]);
        assert_eq!(
            parse_success(&res, ResponseType::Auto).expect("bytes never fail"),
            ParsedBody::Bytes(vec![137u8, 80].into())
        );

        let bare = TransportResponse::new(200).with_body(&b"{}"[..]);
        assert!(matches!(
            parse_success(&bare, ResponseType::Auto),
            Ok(ParsedBody::Bytes(_))
        ));
    }

    #[test]
    fn explicit_type_overrides_content_type() {
        let res = response("text/html", br#"{"a":1}"#);
        assert_eq!(
            parse_success(&res, ResponseType::Json).expect("valid json"),
            ParsedBody::Json(json!({"a": 1}))
        );

        let json = response("application/json", br#"{"a":1}"#);
        assert_eq!(
            parse_success(&json, ResponseType::Text).expect("text never fails"),
            ParsedBody::Text(r#"{"a":1}"#.to_owned())
        );
        assert!(matches!(
            parse_success(&json, ResponseType::Blob),
            Ok(ParsedBody::Blob { .. })
        ));
    }

    #[test]
    fn empty_json_body_decodes_to_null() {
        let res = response("application/json", b"");
        assert_eq!(
            parse_success(&res, ResponseType::Auto).expect("empty body is not an error"),
            ParsedBody::Json(serde_json::Value::Null)
        );

        let bare = TransportResponse::new(204);
        assert_eq!(
            parse_success(&bare, ResponseType::Json).expect("empty body is not an error"),
            ParsedBody::Json(serde_json::Value::Null)
        );
    }

    #[test]
    fn invalid_json_is_an_error() {
        let res = response("application/json", b"not json");
        assert!(parse_success(&res, ResponseType::Auto).is_err());
    }

    #[test]
    fn failure_payload_prefers_json_then_text() {
        let json = TransportResponse::new(422).with_body(&br#"{"error":"bad"}"#[..]);
        assert_eq!(
            parse_failure(&json),
            Some(ErrorPayload::Json(json!({"error": "bad"})))
        );

        let text = TransportResponse::new(500).with_body(&b"upstream exploded"[..]);
        assert_eq!(
            parse_failure(&text),
            Some(ErrorPayload::Text("upstream exploded".to_owned()))
        );
    }

    #[test]
    fn failure_payload_never_fails() {
        let garbage = TransportResponse::new(500).with_body(vec![0xffu8, 0xfe, 0x00, 0x9f]);
        assert_eq!(parse_failure(&garbage), None);
        assert_eq!(parse_failure(&TransportResponse::new(404)), None);
    }

    #[test]
    fn into_json_deserializes_typed_values() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Item {
            id: u32,
        }

        let item: Item = ParsedBody::Json(json!({"id": 3}))
            .into_json()
            .expect("must deserialize");
        assert_eq!(item, Item { id: 3 });
    }
}
