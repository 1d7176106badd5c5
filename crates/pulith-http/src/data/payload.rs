//! Outgoing payload representations and their normalization.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::error::BoxError;

use super::readable::ReadableStream;

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// A request payload as supplied by the caller.
#[derive(Clone)]
pub enum Payload {
    Text(String),
    Bytes(Bytes),
    Stream(PayloadStream),
}

impl Payload {
    /// Wrap a chunk stream. The stream is consumed at most once.
    pub fn stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Sync + 'static,
        E: Into<BoxError> + 'static,
    {
        Payload::Stream(PayloadStream::new(stream.map_err(io::Error::other)))
    }

    /// Stream the contents of an async reader, such as an open file.
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        Payload::Stream(PayloadStream::new(ReaderStream::new(reader)))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Payload::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Payload::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Payload::Bytes(Bytes::from_static(bytes))
    }
}

impl From<ReadableStream> for Payload {
    fn from(stream: ReadableStream) -> Self {
        Payload::Stream(PayloadStream::new(stream))
    }
}

impl From<PayloadStream> for Payload {
    fn from(stream: PayloadStream) -> Self {
        Payload::Stream(stream)
    }
}

/// Lifecycle of a single-pass payload stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No chunk has been requested yet; the stream can still be sent.
    NotStarted,
    /// A transport has begun pulling chunks.
    InProgress,
    /// Every chunk has been handed out.
    Exhausted,
}

struct Slot {
    state: StreamState,
    source: Option<ByteStream>,
}

/// Shared handle to a single-pass chunk stream.
///
/// Clones refer to the same underlying stream. The source is only taken when
/// a [`PayloadReader`] is first polled, so a request that was answered before
/// its body was pulled leaves the stream in [`StreamState::NotStarted`].
#[derive(Clone)]
pub struct PayloadStream {
    slot: Arc<Mutex<Slot>>,
}

impl PayloadStream {
    pub fn new<S>(source: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                state: StreamState::NotStarted,
                source: Some(Box::pin(source)),
            })),
        }
    }

    pub fn state(&self) -> StreamState {
        lock(&self.slot).state
    }

    pub fn is_replayable(&self) -> bool {
        self.state() == StreamState::NotStarted
    }

    /// Reader for one transmission, or `None` once the stream has started.
    pub fn reader(&self) -> Option<PayloadReader> {
        if !self.is_replayable() {
            return None;
        }
        Some(PayloadReader {
            slot: Arc::clone(&self.slot),
            source: None,
            done: false,
        })
    }
}

impl fmt::Debug for PayloadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadStream")
            .field("state", &self.state())
            .finish()
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outgoing side of a [`PayloadStream`], handed to the transport.
pub struct PayloadReader {
    slot: Arc<Mutex<Slot>>,
    source: Option<ByteStream>,
    done: bool,
}

impl Stream for PayloadReader {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        if this.source.is_none() {
            let mut slot = lock(&this.slot);
            match slot.source.take() {
                Some(source) => {
                    slot.state = StreamState::InProgress;
                    this.source = Some(source);
                }
                None => {
                    this.done = true;
                    return Poll::Ready(Some(Err(io::Error::other(
                        "payload stream was already consumed",
                    ))));
                }
            }
        }

        let Some(source) = this.source.as_mut() else {
            return Poll::Ready(None);
        };
        match source.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.done = true;
                this.source = None;
                lock(&this.slot).state = StreamState::Exhausted;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl fmt::Debug for PayloadReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadReader")
            .field("started", &self.source.is_some())
            .field("done", &self.done)
            .finish()
    }
}

/// A payload reduced to what goes on the wire.
#[derive(Debug, Clone, Default)]
pub enum NormalizedPayload {
    #[default]
    Absent,
    Bytes(Bytes),
    Stream(PayloadStream),
}

impl NormalizedPayload {
    /// Exact body length, known only for buffered payloads.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            NormalizedPayload::Bytes(bytes) => Some(bytes.len() as u64),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, NormalizedPayload::Absent)
    }
}

/// Reduce a caller payload to its wire representation.
///
/// Text is measured in UTF-8 bytes, so `"ć"` has length 2.
pub fn normalize(payload: Option<Payload>) -> NormalizedPayload {
    match payload {
        None => NormalizedPayload::Absent,
        Some(Payload::Text(text)) => NormalizedPayload::Bytes(Bytes::from(text.into_bytes())),
        Some(Payload::Bytes(bytes)) => NormalizedPayload::Bytes(bytes),
        Some(Payload::Stream(stream)) => NormalizedPayload::Stream(stream),
    }
}
