//! The HTTP primitive the executor drives.
//!
//! [`Transport`] is the seam between retry policy and the wire. The default
//! [`ReqwestTransport`] sends through `reqwest`; tests plug in scripted
//! implementations.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Method, Url,
};

use crate::{Body, ErrorKind};

/// A fully prepared request for a single attempt.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
}

/// A response with its body already read.
#[derive(Clone, Debug, Default)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Declared content type, or an empty string when absent.
    pub fn content_type(&self) -> &str {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }
}

/// Failure raised by a [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be constructed.
    #[error("invalid request: {0}")]
    Build(String),
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The exchange failed after the connection was made.
    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Self::Build(_) => ErrorKind::Build,
            Self::Connect(_) => ErrorKind::Connect,
            Self::Network(_) => ErrorKind::Network,
        }
    }
}

/// Sends one request and reads the whole response.
///
/// Implementations must not retry or time out on their own; the executor
/// owns both.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a preconfigured client (proxies, default headers, TLS roots).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.http.request(request.method, request.url);

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::Build(format!("header name {name:?}: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| TransportError::Build(format!("header {name}: {err}")))?;
            builder = builder.header(name, value);
        }

        builder = match request.body {
            None => builder,
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Text(text)) => builder.body(text),
            Some(Body::Bytes(bytes)) => builder.body(bytes),
            Some(Body::Form(fields)) => builder.form(&fields),
        };

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_builder() {
        TransportError::Build(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}
