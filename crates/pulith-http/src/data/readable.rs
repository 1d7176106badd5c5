//! Single-pass readable streams built from buffered payloads.

use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use bytes::Bytes;
use futures_util::Stream;

use crate::error::{Error, Result};

/// Largest chunk yielded when a [`ReadableStream`] is polled as a stream.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Text encodings accepted by [`to_readable_stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
    Hex,
    Base64,
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "ascii" => Ok(Encoding::Ascii),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Encoding::Utf16Le),
            "hex" => Ok(Encoding::Hex),
            "base64" => Ok(Encoding::Base64),
            other => Err(Error::InvalidPayload(format!("unknown encoding '{other}'"))),
        }
    }
}

impl Encoding {
    /// Turn text into bytes under this encoding.
    ///
    /// `Ascii` and `Latin1` keep the low byte of every UTF-16 code unit.
    pub fn encode(self, text: &str) -> Result<Bytes> {
        let bytes = match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Ascii | Encoding::Latin1 => text.encode_utf16().map(|unit| unit as u8).collect(),
            Encoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::Hex => hex::decode(text.trim())
                .map_err(|e| Error::InvalidPayload(format!("invalid hex payload: {e}")))?,
            Encoding::Base64 => decode_base64(text.trim())?,
        };
        Ok(Bytes::from(bytes))
    }
}

fn decode_base64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .or_else(|_| STANDARD_NO_PAD.decode(text))
        .or_else(|_| URL_SAFE_NO_PAD.decode(text.trim_end_matches('=')))
        .map_err(|e| Error::InvalidPayload(format!("invalid base64 payload: {e}")))
}

/// Buffered material for a [`ReadableStream`].
#[derive(Debug, Clone)]
pub enum StreamSource {
    Text(String),
    Bytes(Bytes),
}

impl From<&str> for StreamSource {
    fn from(text: &str) -> Self {
        StreamSource::Text(text.to_owned())
    }
}

impl From<String> for StreamSource {
    fn from(text: String) -> Self {
        StreamSource::Text(text)
    }
}

impl From<Bytes> for StreamSource {
    fn from(bytes: Bytes) -> Self {
        StreamSource::Bytes(bytes)
    }
}

impl From<Vec<u8>> for StreamSource {
    fn from(bytes: Vec<u8>) -> Self {
        StreamSource::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for StreamSource {
    fn from(bytes: &'static [u8]) -> Self {
        StreamSource::Bytes(Bytes::from_static(bytes))
    }
}

/// A finite, single-pass sequence of byte chunks over a buffer.
///
/// Reading advances a cursor that never moves backward. Once the cursor
/// reaches the end every further read reports end of stream.
#[derive(Debug)]
pub struct ReadableStream {
    data: Bytes,
    position: usize,
    chunk_size: usize,
}

impl ReadableStream {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            position: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Total bytes in the underlying buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Take the next `size` bytes, or everything left when `size` is `None`.
    ///
    /// Returns `None` at end of stream; an empty stream ends on the first call.
    pub fn read(&mut self, size: Option<usize>) -> Option<Bytes> {
        let remaining = self.remaining();
        if remaining == 0 {
            return None;
        }
        let take = size.filter(|n| *n > 0).unwrap_or(remaining).min(remaining);
        let chunk = self.data.slice(self.position..self.position + take);
        self.position += take;
        Some(chunk)
    }
}

impl Default for ReadableStream {
    fn default() -> Self {
        Self::empty()
    }
}

impl Stream for ReadableStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let size = this.chunk_size;
        Poll::Ready(this.read(Some(size)).map(Ok))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let chunks = self.remaining().div_ceil(self.chunk_size);
        (chunks, Some(chunks))
    }
}

/// Build a [`ReadableStream`] from text or bytes.
///
/// `encoding` applies to text only and defaults to UTF-8.
pub fn to_readable_stream(
    source: impl Into<StreamSource>,
    encoding: Option<Encoding>,
) -> Result<ReadableStream> {
    let data = match source.into() {
        StreamSource::Text(text) => encoding.unwrap_or_default().encode(&text)?,
        StreamSource::Bytes(bytes) => bytes,
    };
    Ok(ReadableStream::new(data))
}
