use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use http::header::{CONTENT_TYPE, HeaderMap, LOCATION};
use http::{Method, StatusCode};
use tracing::trace;
use url::Url;

use crate::core::Scheme;
use crate::data::{Downstream, PayloadReader, ReadOptions};
use crate::error::{Result, TransportError};

use super::agent::SocketLease;
use super::reader::{Content, read};

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Intermediate bodies larger than this are destroyed instead of drained.
const DISCARD_LIMIT: usize = 64 * 1024;

/// Asynchronous HTTP transport abstraction.
///
/// A transport performs exactly one exchange per call: it never follows
/// redirects and never retries. Name resolution, TLS, and connection reuse
/// are its business.
///
/// # Implementations
///
/// - [`ReqwestTransport`]: Production implementation using `reqwest`
/// - Scripted implementations for testing
pub trait Transport: Send + Sync {
    /// Send the request and resolve once the response headers arrive.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] classified by kind when the connection
    /// cannot be made or breaks before the headers are received. HTTP error
    /// statuses are responses, not errors.
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = std::result::Result<Response, TransportError>> + Send;
}

/// One wire exchange as handed to a [`Transport`].
#[derive(Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub scheme: Scheme,
    pub headers: HeaderMap,
    pub body: OutgoingBody,
    pub verify_tls: bool,
}

#[derive(Debug)]
pub enum OutgoingBody {
    Empty,
    /// Sent with a `Content-Length` equal to its size.
    Full(Bytes),
    /// Sent chunked.
    Stream(PayloadReader),
}

/// A response body that is consumed or destroyed exactly once.
///
/// The body ends after the first `None` or error. Any agent slot attached
/// to it is released at that point, or when the body is dropped.
#[derive(Default)]
pub struct Body {
    inner: Option<BoxStream<'static, std::result::Result<Bytes, TransportError>>>,
    lease: Option<SocketLease>,
}

impl Body {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, TransportError>> + Send + 'static,
    {
        Self {
            inner: Some(Box::pin(stream)),
            lease: None,
        }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Self::empty();
        }
        Self::from_stream(futures_util::stream::once(async move { Ok(bytes) }))
    }

    pub(crate) fn attach_lease(&mut self, lease: SocketLease) {
        if self.inner.is_some() {
            self.lease = Some(lease);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    fn finish(&mut self) {
        self.inner = None;
        self.lease = None;
    }

    /// Drain a short body within `within`; destroy anything longer or slower.
    pub async fn discard(mut self, within: Duration) {
        let drained = tokio::time::timeout(within, async {
            let mut seen = 0usize;
            while let Some(chunk) = self.next().await {
                match chunk {
                    Ok(chunk) => {
                        seen += chunk.len();
                        if seen > DISCARD_LIMIT {
                            return false;
                        }
                    }
                    Err(_) => return true,
                }
            }
            true
        })
        .await;
        trace!(drained = matches!(drained, Ok(true)), "discarded response body");
    }
}

impl Stream for Body {
    type Item = std::result::Result<Bytes, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("finished", &self.is_finished())
            .field("leased", &self.lease.is_some())
            .finish()
    }
}

/// Status line, headers, and final URL of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
}

impl ResponseHead {
    pub fn new(status: StatusCode, url: Url) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url,
        }
    }

    fn header_str(&self, name: http::header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header_str(LOCATION)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_str(CONTENT_TYPE)
    }
}

/// A response whose body has not been read yet.
pub struct Response {
    head: ResponseHead,
    body: Body,
    downstream: Option<Downstream>,
}

impl Response {
    pub fn new(head: ResponseHead, body: Body) -> Self {
        Self {
            head,
            body,
            downstream: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// URL of the exchange that produced this response.
    pub fn url(&self) -> &Url {
        &self.head.url
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn location(&self) -> Option<&str> {
        self.head.location()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.head.content_type()
    }

    /// Handle passed with the request, returned untouched.
    pub fn downstream(&self) -> Option<&Downstream> {
        self.downstream.as_ref()
    }

    pub(crate) fn set_downstream(&mut self, downstream: Option<Downstream>) {
        self.downstream = downstream;
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    pub fn into_parts(self) -> (ResponseHead, Body) {
        (self.head, self.body)
    }

    /// Read the whole body, see [`read`].
    pub async fn read(self, options: &ReadOptions) -> Result<Content> {
        read(self, options).await
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.head.status)
            .field("url", &self.head.url.as_str())
            .field("body", &self.body)
            .finish()
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::error::Error as _;
    use std::io;

    use super::*;
    use crate::error::{Error, TransportErrorKind, kind_of_io};

    /// Production transport using reqwest.
    ///
    /// Holds a certificate-verifying client and a non-verifying one, and
    /// picks per request. Both have redirect following disabled.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        verifying: reqwest::Client,
        insecure: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Result<Self> {
            Ok(Self {
                verifying: build_client(true)?,
                insecure: build_client(false)?,
            })
        }
    }

    fn build_client(verify_tls: bool) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| Error::Transport(TransportError::with_source(TransportErrorKind::Tls, e)))
    }

    impl Transport for ReqwestTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> std::result::Result<Response, TransportError> {
            let client = if request.verify_tls {
                &self.verifying
            } else {
                &self.insecure
            };

            let mut builder = client
                .request(request.method, request.url)
                .headers(request.headers);
            builder = match request.body {
                OutgoingBody::Empty => builder,
                OutgoingBody::Full(bytes) => builder.body(bytes),
                OutgoingBody::Stream(reader) => builder.body(reqwest::Body::wrap_stream(reader)),
            };

            let response = builder.send().await.map_err(map_reqwest_error)?;
            let head = ResponseHead {
                status: response.status(),
                headers: response.headers().clone(),
                url: response.url().clone(),
            };
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(map_reqwest_error));
            Ok(Response::new(head, Body::from_stream(body)))
        }
    }

    fn map_reqwest_error(e: reqwest::Error) -> TransportError {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else {
            classify(&e)
        };
        TransportError::with_source(kind, e)
    }

    fn classify(e: &reqwest::Error) -> TransportErrorKind {
        let mut cause = e.source();
        while let Some(err) = cause {
            if let Some(io) = err.downcast_ref::<io::Error>() {
                let kind = kind_of_io(io);
                if kind != TransportErrorKind::Other {
                    return kind;
                }
            }
            let text = err.to_string().to_ascii_lowercase();
            if text.contains("dns error") || text.contains("failed to lookup address") {
                return TransportErrorKind::Dns;
            }
            if text.contains("certificate") || text.contains("tls handshake") {
                return TransportErrorKind::Tls;
            }
            if text.contains("connection closed before message completed") {
                return TransportErrorKind::ConnectionReset;
            }
            cause = err.source();
        }
        TransportErrorKind::Other
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestTransport;
