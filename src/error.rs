use std::fmt;

use reqwest::StatusCode;

use crate::decode::ErrorPayload;

/// Why an attempt was cancelled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CancelReason {
    /// The per-attempt timeout elapsed.
    Timeout,
    /// The caller-supplied [`CancelHandle`](crate::CancelHandle) fired.
    Explicit,
}

/// Failure classification used by the retry loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The request could not be built: malformed URL, invalid method,
    /// unserializable body.
    Build,
    /// The connection could not be established (DNS, refused, unreachable).
    Connect,
    /// The attempt was cancelled by timeout or by the caller.
    Cancelled(CancelReason),
    /// The response status was rejected by the status validator.
    Status,
    /// Any other transport failure while sending or reading the response.
    Network,
    /// An accepted response body could not be decoded.
    Decode,
}

impl ErrorKind {
    /// Returns `true` when no further attempts should be made.
    ///
    /// Status rejections are fatal only for client errors (4xx).
    pub fn is_fatal(self, status: Option<u16>) -> bool {
        match self {
            Self::Build | Self::Connect | Self::Cancelled(_) => true,
            Self::Status => status.is_some_and(|code| (400..500).contains(&code)),
            Self::Network | Self::Decode => false,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Build => "build",
            Self::Connect => "connect",
            Self::Cancelled(CancelReason::Timeout) => "timeout",
            Self::Cancelled(CancelReason::Explicit) => "cancelled",
            Self::Status => "status",
            Self::Network => "network",
            Self::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// Error returned by [`Fetcher::execute`](crate::Fetcher::execute).
///
/// Carries the request context (final URL, method, attempt) alongside the
/// HTTP status and diagnostic payload when a response was received.
#[derive(Debug, thiserror::Error)]
#[error("{method} {url} failed on attempt {attempt}: {message}")]
pub struct FetchError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    data: Option<ErrorPayload>,
    url: String,
    method: String,
    attempt: usize,
}

impl FetchError {
    pub(crate) fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        url: impl Into<String>,
        method: impl Into<String>,
        attempt: usize,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            data: None,
            url: url.into(),
            method: method.into(),
            attempt,
        }
    }

    /// Builds a status rejection whose message is derived from the status code.
    pub(crate) fn status(
        status: u16,
        data: Option<ErrorPayload>,
        url: impl Into<String>,
        method: impl Into<String>,
        attempt: usize,
    ) -> Self {
        Self {
            kind: ErrorKind::Status,
            message: status_message(status),
            status: Some(status),
            data,
            url: url.into(),
            method: method.into(),
            attempt,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status code, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        self.status
    }

    /// Decoded error body, if any could be extracted.
    pub fn data(&self) -> Option<&ErrorPayload> {
        self.data.as_ref()
    }

    /// Final request URL including the query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Uppercased request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Attempt number (1-based) at which the call terminated.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal(self.status)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled(_))
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Cancelled(CancelReason::Timeout)
    }
}

fn status_message(status: u16) -> String {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason());
    match reason {
        Some(reason) => format!("HTTP {status} {reason}"),
        None => format!("HTTP {status}"),
    }
}

/// Base URL that could not be parsed as an absolute URL.
#[derive(Debug, thiserror::Error)]
#[error("invalid url {url:?}: {reason}")]
pub struct InvalidUrl {
    pub url: String,
    pub reason: String,
}

/// Invalid value in an environment-provided configuration.
#[derive(Debug, thiserror::Error)]
#[error("invalid value for {name}: {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}
