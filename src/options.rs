use std::{fmt, sync::Arc};

use crate::{Body, CancelHandle, ConfigError};

/// Predicate deciding which status codes count as success.
pub type StatusValidator = Arc<dyn Fn(u16) -> bool + Send + Sync>;

/// How an accepted response body should be decoded.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ResponseType {
    /// Pick the format from the response content type.
    #[default]
    Auto,
    Json,
    Text,
    Blob,
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Json => "json",
            Self::Text => "text",
            Self::Blob => "blob",
        }
    }
}

/// Per-request configuration: method, headers, body, query, retry and
/// timeout behavior.
///
/// Built with [`Default`] plus the consuming setters below.
#[derive(Clone)]
pub struct RequestConfig {
    /// HTTP verb, case-insensitive.
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    /// Query entries appended in order. `None` values are skipped.
    pub query: Vec<(String, Option<String>)>,
    /// Retries after the first attempt.
    pub retries: usize,
    /// Base backoff in milliseconds, doubled after every failed attempt.
    pub retry_delay_ms: u64,
    /// Whole-attempt timeout in milliseconds. `0` disables it.
    pub timeout_ms: u64,
    pub response_type: ResponseType,
    pub validate_status: StatusValidator,
    /// Emit per-attempt and per-failure debug events.
    pub debug: bool,
    /// Caller-driven cancellation; replaces the timeout when set.
    pub cancel: Option<CancelHandle>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            method: "GET".to_owned(),
            headers: Vec::new(),
            body: None,
            query: Vec::new(),
            retries: 3,
            retry_delay_ms: 1_000,
            timeout_ms: 10_000,
            response_type: ResponseType::Auto,
            validate_status: Arc::new(|status: u16| (200..300).contains(&status)),
            debug: false,
            cancel: None,
        }
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("query", &self.query)
            .field("retries", &self.retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("timeout_ms", &self.timeout_ms)
            .field("response_type", &self.response_type)
            .field("debug", &self.debug)
            .field("cancel", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden from the environment.
    ///
    /// Reads `FETCH_RETRIES`, `FETCH_RETRY_DELAY_MS`, `FETCH_TIMEOUT_MS` and
    /// `FETCH_DEBUG`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(retries) = parse_var(&lookup, "FETCH_RETRIES")? {
            config.retries = retries;
        }
        if let Some(delay) = parse_var(&lookup, "FETCH_RETRY_DELAY_MS")? {
            config.retry_delay_ms = delay;
        }
        if let Some(timeout) = parse_var(&lookup, "FETCH_TIMEOUT_MS")? {
            config.timeout_ms = timeout;
        }
        if let Some(raw) = lookup("FETCH_DEBUG") {
            config.debug = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "" | "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError {
                        name: "FETCH_DEBUG",
                        value: raw,
                    })
                }
            };
        }
        Ok(config)
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json(self, value: serde_json::Value) -> Self {
        self.body(Body::Json(value))
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), Some(value.to_string())));
        self
    }

    /// Adds a query entry that is omitted from the URL when `value` is `None`.
    pub fn query_opt<V: ToString>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.query
            .push((name.into(), value.map(|value| value.to_string())));
        self
    }

    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn validate_status<F>(mut self, validator: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Arc::new(validator);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{RequestConfig, ResponseType};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RequestConfig::default();
        assert_eq!(config.method, "GET");
        assert_eq!(config.retries, 3);
        assert_eq!(config.retry_delay_ms, 1_000);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.response_type, ResponseType::Auto);
        assert!(!config.debug);
        assert!(config.cancel.is_none());
    }

    #[test]
    fn default_validator_accepts_2xx_only() {
        let config = RequestConfig::default();
        assert!((config.validate_status)(200));
        assert!((config.validate_status)(204));
        assert!(!(config.validate_status)(199));
        assert!(!(config.validate_status)(301));
        assert!(!(config.validate_status)(404));
    }

    #[test]
    fn query_opt_records_absent_entries() {
        let config = RequestConfig::new()
            .query("page", 2)
            .query_opt("filter", None::<&str>);
        assert_eq!(
            config.query,
            vec![
                ("page".to_owned(), Some("2".to_owned())),
                ("filter".to_owned(), None),
            ]
        );
    }

    #[test]
    fn env_overrides_defaults() {
        let config = RequestConfig::from_lookup(lookup_from(&[
            ("FETCH_RETRIES", "5"),
            ("FETCH_RETRY_DELAY_MS", " 250 "),
            ("FETCH_TIMEOUT_MS", "0"),
            ("FETCH_DEBUG", "true"),
        ]))
        .expect("valid env");
        assert_eq!(config.retries, 5);
        assert_eq!(config.retry_delay_ms, 250);
        assert_eq!(config.timeout_ms, 0);
        assert!(config.debug);
    }

    #[test]
    fn env_rejects_garbage() {
        let err = RequestConfig::from_lookup(lookup_from(&[("FETCH_RETRIES", "many")]))
            .expect_err("must reject non-numeric retries");
        assert_eq!(err.name, "FETCH_RETRIES");
        assert_eq!(err.value, "many");

        let err = RequestConfig::from_lookup(lookup_from(&[("FETCH_DEBUG", "maybe")]))
            .expect_err("must reject unknown flag");
        assert_eq!(err.name, "FETCH_DEBUG");
    }

    #[test]
    fn debug_output_skips_validator() {
        let debug = format!("{:?}", RequestConfig::default());
        assert!(debug.contains("RequestConfig"));
        assert!(debug.contains("retries: 3"));
    }
}
