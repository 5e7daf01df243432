use std::{fmt, sync::Arc, time::Duration};

use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::sleep;

use crate::{
    body::prepare_body,
    decode::{parse_failure, parse_success},
    Body, CancelReason, ErrorKind, FetchError, InvalidUrl, ParsedBody, ReqwestTransport,
    RequestConfig, Result, Transport, TransportRequest,
};

/// Appends every present query entry to `base` through the URL serializer.
///
/// Example: `("q", Some("a&b"))` on `https://api.test/search` gives
/// `https://api.test/search?q=a%26b`.
pub fn build_url(
    base: &str,
    query: &[(String, Option<String>)],
) -> std::result::Result<Url, InvalidUrl> {
    let mut url = Url::parse(base.trim()).map_err(|err| InvalidUrl {
        url: base.to_owned(),
        reason: err.to_string(),
    })?;

    let mut present = query
        .iter()
        .filter_map(|(name, value)| value.as_deref().map(|value| (name, value)))
        .peekable();

    if present.peek().is_some() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in present {
            pairs.append_pair(name, value);
        }
    }

    Ok(url)
}

/// Backoff before the attempt following failed attempt `attempt` (1-based):
/// `base_ms * 2^(attempt - 1)`, saturating.
pub fn backoff_delay(base_ms: u64, attempt: usize) -> Duration {
    let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(exp)))
}

fn normalize_method(method: &str) -> std::result::Result<Method, String> {
    let upper = method.trim().to_ascii_uppercase();
    Method::from_bytes(upper.as_bytes()).map_err(|_| format!("invalid http method {method:?}"))
}

#[derive(Clone)]
/// HTTP request executor with retry, backoff, timeout and response decoding.
///
/// Cheap to clone; clones share the underlying transport. Calls are
/// independent of each other and may run concurrently.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved request identity shared by every attempt of one call.
struct CallTarget {
    url: Url,
    method: Method,
}

impl CallTarget {
    fn error(&self, kind: ErrorKind, message: impl Into<String>, attempt: usize) -> FetchError {
        FetchError::new(kind, message, self.url.as_str(), self.method.as_str(), attempt)
    }
}

impl Fetcher {
    /// Creates an executor over a default `reqwest` client.
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Creates an executor over a preconfigured `reqwest` client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self::with_transport(ReqwestTransport::with_client(http))
    }

    /// Creates an executor over any [`Transport`].
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Sends a GET with default configuration.
    pub async fn get(&self, url: &str) -> Result<ParsedBody> {
        self.execute(url, &RequestConfig::default()).await
    }

    /// Sends `value` as a JSON POST with default configuration.
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, value: &T) -> Result<ParsedBody> {
        let body = Body::json(value).map_err(|err| {
            FetchError::new(
                ErrorKind::Build,
                format!("body serialization failed: {err}"),
                url,
                "POST",
                1,
            )
        })?;
        let config = RequestConfig::default().method("POST").body(body);
        self.execute(url, &config).await
    }

    /// Runs the request and deserializes the decoded body into `T`.
    ///
    /// A body that does not match `T` is a [`ErrorKind::Decode`] error and is
    /// not retried.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        url: &str,
        config: &RequestConfig,
    ) -> Result<T> {
        let (target, attempt, body) = self.run(url, config).await?;
        body.into_json().map_err(|err| {
            target.error(
                ErrorKind::Decode,
                format!("unexpected response shape: {err}"),
                attempt,
            )
        })
    }

    /// Runs the request with retries and returns the decoded body.
    ///
    /// Makes at most `config.retries + 1` attempts. After a retryable failure
    /// on attempt `n` it waits `retry_delay_ms * 2^(n-1)` before trying again.
    /// Cancellation, connection failures and 4xx rejections stop immediately.
    pub async fn execute(&self, url: &str, config: &RequestConfig) -> Result<ParsedBody> {
        self.run(url, config).await.map(|(_, _, body)| body)
    }

    async fn run(
        &self,
        url: &str,
        config: &RequestConfig,
    ) -> Result<(CallTarget, usize, ParsedBody)> {
        let method = normalize_method(&config.method).map_err(|message| {
            FetchError::new(ErrorKind::Build, message, url, config.method.trim(), 1)
        })?;
        let resolved = build_url(url, &config.query).map_err(|err| {
            FetchError::new(ErrorKind::Build, err.to_string(), url, method.as_str(), 1)
        })?;
        let target = CallTarget {
            url: resolved,
            method,
        };

        let mut headers = config.headers.clone();
        let body = prepare_body(&target.method, config.body.as_ref(), &mut headers).map_err(
            |err| target.error(ErrorKind::Build, format!("body serialization failed: {err}"), 1),
        )?;

        let mut attempt = 1usize;
        loop {
            if config.debug {
                tracing::debug!(
                    method = %target.method,
                    url = %target.url,
                    attempt,
                    has_body = body.is_some(),
                    "sending request"
                );
            }

            let request = TransportRequest {
                method: target.method.clone(),
                url: target.url.clone(),
                headers: headers.clone(),
                body: body.clone(),
            };

            let err = match self.attempt(request, config, &target, attempt).await {
                Ok(parsed) => return Ok((target, attempt, parsed)),
                Err(err) => err,
            };

            if config.debug {
                tracing::debug!(
                    method = %target.method,
                    url = %target.url,
                    attempt,
                    kind = %err.kind(),
                    status = ?err.status_code(),
                    data = ?err.data(),
                    error = %err.message(),
                    "request failed"
                );
            }

            if err.is_fatal() || attempt > config.retries {
                return Err(err);
            }

            let delay = backoff_delay(config.retry_delay_ms, attempt);
            if config.debug {
                tracing::debug!(
                    "retrying {} {} after {} ms",
                    target.method,
                    target.url,
                    delay.as_millis()
                );
            }

            match &config.cancel {
                Some(cancel) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(target.error(
                                ErrorKind::Cancelled(CancelReason::Explicit),
                                "request cancelled",
                                attempt,
                            ));
                        }
                        _ = sleep(delay) => {}
                    }
                }
                None => sleep(delay).await,
            }

            attempt += 1;
        }
    }

    /// One request/response cycle under the attempt's cancellation slot.
    async fn attempt(
        &self,
        request: TransportRequest,
        config: &RequestConfig,
        target: &CallTarget,
        attempt: usize,
    ) -> Result<ParsedBody> {
        let sent = match &config.cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(target.error(
                            ErrorKind::Cancelled(CancelReason::Explicit),
                            "request cancelled",
                            attempt,
                        ));
                    }
                    sent = self.transport.send(request) => sent,
                }
            }
            None if config.timeout_ms > 0 => {
                let limit = Duration::from_millis(config.timeout_ms);
                match tokio::time::timeout(limit, self.transport.send(request)).await {
                    Ok(sent) => sent,
                    Err(_) => {
                        return Err(target.error(
                            ErrorKind::Cancelled(CancelReason::Timeout),
                            format!("request timed out after {} ms", config.timeout_ms),
                            attempt,
                        ));
                    }
                }
            }
            None => self.transport.send(request).await,
        };

        let response = sent.map_err(|err| target.error(err.kind(), err.to_string(), attempt))?;

        if !(config.validate_status)(response.status) {
            return Err(FetchError::status(
                response.status,
                parse_failure(&response),
                target.url.as_str(),
                target.method.as_str(),
                attempt,
            ));
        }

        parse_success(&response, config.response_type).map_err(|err| {
            target.error(
                ErrorKind::Decode,
                format!("invalid response body: {err}"),
                attempt,
            )
        })
    }
}
