//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use pulith_http::{
    Body, OutgoingBody, Response, ResponseHead, Transport, TransportError, TransportErrorKind,
    TransportRequest,
};
use url::Url;

/// One scripted answer.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    chunks: Vec<Bytes>,
    delay: Duration,
    chunk_delay: Option<Duration>,
    reset_after_body: bool,
    read_request_body: bool,
    fail: Option<TransportErrorKind>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            chunks: Vec::new(),
            delay: Duration::ZERO,
            chunk_delay: None,
            reset_after_body: false,
            read_request_body: true,
            fail: None,
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::status(200).body(body)
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::status(status).header("location", location)
    }

    pub fn fail(kind: TransportErrorKind) -> Self {
        Self {
            fail: Some(kind),
            ..Self::status(0)
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.chunks = vec![body.into()];
        self
    }

    pub fn chunks(mut self, chunks: Vec<Bytes>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Wait before answering with headers.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Wait before each body chunk.
    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Break the connection after the scripted chunks.
    pub fn reset_after_body(mut self) -> Self {
        self.reset_after_body = true;
        self
    }

    /// Answer without pulling the request body.
    pub fn ignore_request_body(mut self) -> Self {
        self.read_request_body = false;
        self
    }
}

/// What the transport was asked to send.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub streamed: bool,
    pub verify_tls: bool,
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Arc::default(),
        }
    }

    pub fn journal(&self) -> Arc<Mutex<Vec<Seen>>> {
        Arc::clone(&self.seen)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<Response, TransportError> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::status(404));

        let (body, streamed) = match request.body {
            OutgoingBody::Empty => (None, false),
            OutgoingBody::Full(bytes) => (Some(bytes), false),
            OutgoingBody::Stream(mut reader) => {
                if reply.read_request_body {
                    let mut collected = BytesMut::new();
                    while let Some(chunk) = reader.next().await {
                        collected.extend_from_slice(&chunk.map_err(TransportError::from)?);
                    }
                    (Some(collected.freeze()), true)
                } else {
                    (None, true)
                }
            }
        };
        self.seen.lock().unwrap().push(Seen {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers,
            body,
            streamed,
            verify_tls: request.verify_tls,
        });

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        if let Some(kind) = reply.fail {
            return Err(TransportError::new(kind, "scripted failure"));
        }

        let mut head = ResponseHead::new(
            StatusCode::from_u16(reply.status).unwrap(),
            request.url,
        );
        for (name, value) in &reply.headers {
            head.headers.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }

        let chunk_delay = reply.chunk_delay;
        let chunks = futures_util::stream::iter(reply.chunks).then(move |chunk| async move {
            if let Some(delay) = chunk_delay {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, TransportError>(chunk)
        });
        let body = if reply.reset_after_body {
            Body::from_stream(chunks.chain(futures_util::stream::once(async {
                Err(TransportError::new(
                    TransportErrorKind::ConnectionReset,
                    "socket hang up",
                ))
            })))
        } else {
            Body::from_stream(chunks)
        };
        Ok(Response::new(head, body))
    }
}
