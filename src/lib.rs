//! `fetch-retry` wraps an HTTP transport with the plumbing most outbound
//! calls need:
//! - query strings built through a URL serializer,
//! - JSON body serialization with a default content type,
//! - bounded retries with exponential backoff,
//! - per-attempt timeouts and caller-driven cancellation,
//! - response decoding picked from the declared content type.
//!
//! The entry point is [`Fetcher::execute`].

mod body;
mod cancel;
mod client;
mod decode;
mod error;
mod options;
mod transport;

pub use body::Body;
pub use cancel::CancelHandle;
pub use client::{backoff_delay, build_url, Fetcher};
pub use decode::{parse_failure, parse_success, ErrorPayload, ParsedBody};
pub use error::{CancelReason, ConfigError, ErrorKind, FetchError, InvalidUrl};
pub use options::{RequestConfig, ResponseType, StatusValidator};
pub use transport::{
    ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
};

pub type Result<T> = std::result::Result<T, FetchError>;
