use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::effects::Agent;
use crate::error::Result;

use super::payload::Payload;

/// Opaque handle carried from a request to its response untouched.
///
/// Proxy pipelines use it to keep the downstream response they are serving
/// next to the upstream response that feeds it.
pub type Downstream = Arc<dyn Any + Send + Sync>;

/// Per-request options.
///
/// Unset fields fall back to the [`ClientConfig`] of the client issuing the
/// request.
///
/// # Examples
///
/// ```
/// use pulith_http::RequestOptions;
/// use std::time::Duration;
///
/// let options = RequestOptions::default()
///     .header("User-Agent", "pulith")
///     .payload("hello")
///     .redirects(3)
///     .timeout(Duration::from_secs(5));
/// ```
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Outgoing headers. Names are case-insensitive; a name given here
    /// replaces the configured default of the same name.
    pub headers: Vec<(String, String)>,

    /// Request body; `None` sends no body.
    pub payload: Option<Payload>,

    /// Redirect budget. `0` returns redirect responses as-is.
    pub redirects: Option<u32>,

    /// Deadline for obtaining response headers, slot wait included.
    pub timeout: Option<Duration>,

    /// Connection-slot capability shared between requests.
    pub agent: Option<Agent>,

    /// Whether TLS certificates are verified.
    pub reject_unauthorized: Option<bool>,

    /// Pass-through handle, see [`Downstream`].
    pub downstream: Option<Downstream>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("headers", &self.headers)
            .field("payload", &self.payload)
            .field("redirects", &self.redirects)
            .field("timeout", &self.timeout)
            .field("agent", &self.agent)
            .field("reject_unauthorized", &self.reject_unauthorized)
            .field("downstream", &self.downstream.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}

impl RequestOptions {
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace all headers.
    #[must_use]
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    #[must_use]
    pub fn redirects(mut self, redirects: u32) -> Self {
        self.redirects = Some(redirects);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    #[must_use]
    pub fn reject_unauthorized(mut self, reject: bool) -> Self {
        self.reject_unauthorized = Some(reject);
        self
    }

    #[must_use]
    pub fn downstream(mut self, downstream: Downstream) -> Self {
        self.downstream = Some(downstream);
        self
    }
}

/// How a read treats the body as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JsonMode {
    /// Return raw bytes.
    #[default]
    Off,
    /// Decode when the response declares a JSON media type.
    ContentType,
    /// Decode regardless of the declared media type.
    Force,
}

/// Options for materializing a response body.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Deadline for the whole body, measured from the start of the read.
    pub timeout: Option<Duration>,

    /// Largest accepted body; longer bodies fail instead of being truncated.
    pub max_bytes: Option<usize>,

    pub json: JsonMode,
}

impl ReadOptions {
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    #[must_use]
    pub fn json(mut self, json: JsonMode) -> Self {
        self.json = json;
        self
    }

    /// Fill unset limits from `config`.
    pub(crate) fn or_config(&self, config: &ClientConfig) -> Self {
        Self {
            timeout: self.timeout.or_else(|| config.read_timeout()),
            max_bytes: self.max_bytes.or(config.max_bytes),
            json: self.json,
        }
    }
}

/// Options for the verb shortcuts, which request and then read.
#[derive(Debug, Clone, Default)]
pub struct ShortcutOptions {
    pub request: RequestOptions,
    pub read: ReadOptions,
}

impl ShortcutOptions {
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request = self.request.header(name, value);
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.request = self.request.payload(payload);
        self
    }

    #[must_use]
    pub fn redirects(mut self, redirects: u32) -> Self {
        self.request = self.request.redirects(redirects);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request = self.request.timeout(timeout);
        self
    }

    #[must_use]
    pub fn json(mut self, json: JsonMode) -> Self {
        self.read = self.read.json(json);
        self
    }

    #[must_use]
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.read = self.read.max_bytes(max_bytes);
        self
    }
}

impl From<RequestOptions> for ShortcutOptions {
    fn from(request: RequestOptions) -> Self {
        Self {
            request,
            read: ReadOptions::default(),
        }
    }
}

/// Client-wide defaults.
///
/// # Examples
///
/// ```
/// use pulith_http::ClientConfig;
///
/// let config = ClientConfig::from_toml_str(r#"
///     redirects = 5
///     timeout_ms = 10000
///
///     [headers]
///     user-agent = "pulith"
/// "#).unwrap();
/// assert_eq!(config.redirects, 5);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Redirect budget used when a request does not set one.
    pub redirects: u32,

    /// Deadline in milliseconds for response headers.
    pub timeout_ms: Option<u64>,

    /// Deadline in milliseconds for reading a body.
    pub read_timeout_ms: Option<u64>,

    /// Largest body accepted by reads made through the client.
    pub max_bytes: Option<usize>,

    pub reject_unauthorized: bool,

    /// Headers sent with every request unless overridden.
    pub headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            redirects: 0,
            timeout_ms: None,
            read_timeout_ms: None,
            max_bytes: None,
            reject_unauthorized: true,
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_verify_tls_and_do_not_follow() {
        let config = ClientConfig::default();
        assert_eq!(config.redirects, 0);
        assert!(config.reject_unauthorized);
        assert!(config.timeout().is_none());
    }

    #[test]
    fn config_from_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
            redirects = 2
            timeout_ms = 1500
            read_timeout_ms = 250
            max_bytes = 4096
            reject_unauthorized = false

            [headers]
            user-agent = "pulith"
            "#,
        )
        .unwrap();

        assert_eq!(config.redirects, 2);
        assert_eq!(config.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.max_bytes, Some(4096));
        assert!(!config.reject_unauthorized);
        assert_eq!(config.headers.get("user-agent").map(String::as_str), Some("pulith"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str("max_bytes = 10").unwrap();
        assert!(config.reject_unauthorized);
        assert_eq!(config.redirects, 0);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = ClientConfig::from_toml_str("redirects = \"many\"").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn read_options_fall_back_to_config() {
        let config = ClientConfig {
            read_timeout_ms: Some(100),
            max_bytes: Some(64),
            ..ClientConfig::default()
        };
        let merged = ReadOptions::default().max_bytes(8).or_config(&config);
        assert_eq!(merged.max_bytes, Some(8));
        assert_eq!(merged.timeout, Some(Duration::from_millis(100)));
    }

    #[test]
    fn json_mode_names() {
        #[derive(Deserialize)]
        struct Holder {
            json: JsonMode,
        }
        let holder: Holder = toml::from_str("json = \"content-type\"").unwrap();
        assert_eq!(holder.json, JsonMode::ContentType);
    }
}
