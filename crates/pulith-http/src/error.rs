//! Error types for pulith-http.

use std::fmt;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

/// Boxed underlying cause attached to transport and read failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid method '{0}'")]
    InvalidMethod(String),

    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Redirect(#[from] RedirectError),

    #[error(transparent)]
    Read(#[from] ReadError),
}

impl Error {
    /// Status a gateway would answer with when this error ends a proxied call.
    ///
    /// A slow upstream is reported as 504 while connecting and 408 while
    /// streaming the body, so callers can tell the two apart.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidUrl { .. }
            | Error::InvalidMethod(_)
            | Error::InvalidHeader { .. }
            | Error::InvalidPayload(_) => 400,
            Error::Config(_) => 500,
            Error::Transport(e) if e.kind() == TransportErrorKind::Timeout => 504,
            Error::Transport(_) | Error::Redirect(_) => 502,
            Error::Read(e) => match e.kind() {
                ReadErrorKind::Timeout => 408,
                ReadErrorKind::TooLarge | ReadErrorKind::Malformed => 400,
                ReadErrorKind::Transport => 502,
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Transport(e) => e.kind() == TransportErrorKind::Timeout,
            Error::Read(e) => e.kind() == ReadErrorKind::Timeout,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectionRefused,
    ConnectionReset,
    Dns,
    Tls,
    Timeout,
    Other,
}

impl TransportErrorKind {
    /// Conventional socket error code for the kind.
    pub fn code(self) -> &'static str {
        match self {
            TransportErrorKind::ConnectionRefused => "ECONNREFUSED",
            TransportErrorKind::ConnectionReset => "ECONNRESET",
            TransportErrorKind::Dns => "ENOTFOUND",
            TransportErrorKind::Tls => "EPROTO",
            TransportErrorKind::Timeout => "ETIMEDOUT",
            TransportErrorKind::Other => "EUNKNOWN",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The transport could not complete connect, send, or receive.
#[derive(Debug, Error)]
#[error("transport failed ({kind}): {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: TransportErrorKind,
        source: impl Into<BoxError>,
    ) -> Self {
        let source = source.into();
        Self {
            kind,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("no response headers within {}ms", after.as_millis()),
        )
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        let kind = kind_of_io(&e);
        Self::with_source(kind, e)
    }
}

pub(crate) fn kind_of_io(e: &io::Error) -> TransportErrorKind {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => TransportErrorKind::ConnectionReset,
        io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        _ => TransportErrorKind::Other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectErrorKind {
    LocationMissing,
    MaxRedirectsExceeded,
    InvalidLocation,
    PayloadNotReplayable,
}

#[derive(Debug, Error)]
#[error("{} (status {status}, url {url})", describe_redirect(.kind))]
pub struct RedirectError {
    kind: RedirectErrorKind,
    status: u16,
    url: String,
}

fn describe_redirect(kind: &RedirectErrorKind) -> &'static str {
    match kind {
        RedirectErrorKind::LocationMissing => "received redirection without location",
        RedirectErrorKind::MaxRedirectsExceeded => "maximum redirections reached",
        RedirectErrorKind::InvalidLocation => "received redirection to an unusable location",
        RedirectErrorKind::PayloadNotReplayable => {
            "stream payload was already sent and cannot be replayed on redirect"
        }
    }
}

impl RedirectError {
    pub fn new(kind: RedirectErrorKind, status: u16, url: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            url: url.into(),
        }
    }

    pub fn kind(&self) -> RedirectErrorKind {
        self.kind
    }

    /// Status of the redirect response that could not be followed.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadErrorKind {
    Timeout,
    TooLarge,
    Transport,
    Malformed,
}

/// Reading a response body failed.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ReadError {
    kind: ReadErrorKind,
    message: String,
    raw: Option<Bytes>,
    #[source]
    source: Option<BoxError>,
}

impl ReadError {
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: ReadErrorKind::Timeout,
            message: format!("body not received within {}ms", after.as_millis()),
            raw: None,
            source: None,
        }
    }

    pub fn too_large(limit: usize) -> Self {
        Self {
            kind: ReadErrorKind::TooLarge,
            message: format!("payload content length greater than maximum allowed: {limit}"),
            raw: None,
            source: None,
        }
    }

    pub fn transport(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            kind: ReadErrorKind::Transport,
            message: format!("body stream failed: {source}"),
            raw: None,
            source: Some(source),
        }
    }

    pub fn malformed(raw: Bytes, source: serde_json::Error) -> Self {
        Self {
            kind: ReadErrorKind::Malformed,
            message: format!("invalid JSON body: {source}"),
            raw: Some(raw),
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> ReadErrorKind {
        self.kind
    }

    /// Bytes that were received but could not be decoded.
    pub fn raw(&self) -> Option<&Bytes> {
        self.raw.as_ref()
    }
}
