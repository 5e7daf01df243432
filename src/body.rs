use bytes::Bytes;
use reqwest::{header, Method};
use serde::Serialize;

/// Request body.
///
/// `Json` values are serialized by the executor and tagged with
/// `Content-Type: application/json` unless the caller set a content type.
/// Every other variant is sent as-is.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Structured value serialized to JSON.
    Json(serde_json::Value),
    /// Preformatted text sent verbatim.
    Text(String),
    /// Opaque binary payload sent verbatim.
    Bytes(Bytes),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
}

impl Body {
    /// Builds a JSON body from any serializable value.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn bytes(value: impl Into<Bytes>) -> Self {
        Self::Bytes(value.into())
    }

    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

/// Applies the body policy for one request.
///
/// GET and HEAD never carry a body. JSON bodies are serialized here and get
/// a JSON content type only when `headers` has none.
pub(crate) fn prepare_body(
    method: &Method,
    body: Option<&Body>,
    headers: &mut Vec<(String, String)>,
) -> Result<Option<Body>, serde_json::Error> {
    if *method == Method::GET || *method == Method::HEAD {
        return Ok(None);
    }

    match body {
        None => Ok(None),
        Some(Body::Json(value)) => {
            let encoded = serde_json::to_vec(value)?;
            if !has_header(headers, header::CONTENT_TYPE.as_str()) {
                headers.push((
                    header::CONTENT_TYPE.as_str().to_owned(),
                    "application/json".to_owned(),
                ));
            }
            Ok(Some(Body::Bytes(encoded.into())))
        }
        Some(other) => Ok(Some(other.clone())),
    }
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers
        .iter()
        .any(|(existing, _)| existing.eq_ignore_ascii_case(name))
}
