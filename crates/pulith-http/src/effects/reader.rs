use std::pin::pin;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{trace, warn};

use crate::core::is_json_media_type;
use crate::data::{JsonMode, ReadOptions};
use crate::error::{BoxError, ReadError, Result};

use super::deadline::{DeadlineError, with_deadline};
use super::transport::Response;

/// A materialized response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Raw(Bytes),
    Json(Value),
    /// JSON was requested but the body was empty.
    Empty,
}

impl Content {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Content::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Content::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserialize decoded JSON into `T`. `Empty` reads as JSON `null`.
    pub fn json<T: DeserializeOwned>(self) -> std::result::Result<T, serde_json::Error> {
        match self {
            Content::Json(value) => serde_json::from_value(value),
            Content::Empty => serde_json::from_value(Value::Null),
            Content::Raw(bytes) => serde_json::from_slice(&bytes),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Raw(bytes) => bytes.is_empty(),
            Content::Json(_) => false,
            Content::Empty => true,
        }
    }
}

/// Read a response body into memory.
///
/// The timeout covers the whole body and starts now. A body longer than
/// `max_bytes` fails instead of being truncated. On any failure the body
/// is destroyed and its agent slot released.
pub async fn read(response: Response, options: &ReadOptions) -> Result<Content> {
    let content_type = response.content_type().map(str::to_owned);
    read_stream(response.into_body(), content_type.as_deref(), options).await
}

/// Read any chunk stream with the same rules as [`read`].
///
/// `content_type` gates JSON decoding in [`JsonMode::ContentType`].
pub async fn read_stream<S, E>(
    stream: S,
    content_type: Option<&str>,
    options: &ReadOptions,
) -> Result<Content>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let raw = match with_deadline(accumulate(stream, options.max_bytes), options.timeout).await {
        Ok(raw) => raw,
        Err(DeadlineError::Elapsed(after)) => {
            warn!(timeout_ms = after.as_millis() as u64, "body read timed out");
            return Err(ReadError::timeout(after).into());
        }
        Err(DeadlineError::Failed(e)) => return Err(e.into()),
    };
    decode(raw, content_type, options.json)
}

async fn accumulate<S, E>(stream: S, max_bytes: Option<usize>) -> std::result::Result<Bytes, ReadError>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let mut stream = pin!(stream);
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ReadError::transport)?;
        let total = buffer.len() + chunk.len();
        trace!(chunk = chunk.len(), total, "body chunk");
        if let Some(limit) = max_bytes {
            if total > limit {
                return Err(ReadError::too_large(limit));
            }
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

fn decode(raw: Bytes, content_type: Option<&str>, mode: JsonMode) -> Result<Content> {
    let wants_json = match mode {
        JsonMode::Off => false,
        JsonMode::Force => true,
        JsonMode::ContentType => content_type.is_some_and(is_json_media_type),
    };
    if !wants_json {
        return Ok(Content::Raw(raw));
    }
    if raw.is_empty() {
        return Ok(Content::Empty);
    }
    match serde_json::from_slice(&raw) {
        Ok(value) => Ok(Content::Json(value)),
        Err(e) => Err(ReadError::malformed(raw, e).into()),
    }
}
