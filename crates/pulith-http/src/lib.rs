//! HTTP request engine with bounded redirects and guarded body reads.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Request options, payload representations, configuration
//! - [`core`] - Pure transformations (cache-control grammar, redirect rules)
//! - [`effects`] - I/O operations behind the [`Transport`] abstraction
//!
//! # Key Features
//!
//! - **Payload Normalization**: text, bytes, nothing, or a single-pass stream
//!   become one outgoing body with an exact byte length when it is known
//! - **Bounded Redirects**: an iterative hop loop with a fixed budget that
//!   never downgrades the method and never replays a spent stream
//! - **Guarded Reads**: bodies are materialized under a deadline and a byte
//!   ceiling, and the source is destroyed as soon as either is violated
//! - **Explicit Agents**: connection-slot bookkeeping is a value passed per
//!   request, released on every exit path including timeouts

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use core::{CacheControl, Directive, is_redirect, parse_cache_control};
pub use data::{
    ClientConfig, Downstream, Encoding, JsonMode, NormalizedPayload, Payload, PayloadStream,
    ReadOptions, ReadableStream, RequestOptions, RequestSpec, ShortcutOptions, StreamSource,
    StreamState, normalize, to_readable_stream,
};
pub use effects::{
    Agent, Body, BoxStream, Client, Content, DeadlineError, OutgoingBody, RedirectState,
    Response, ResponseHead, Transport, TransportRequest, dispatch, follow_redirects, read,
    read_stream, with_deadline,
};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestTransport;

pub use error::{
    BoxError, Error, ReadError, ReadErrorKind, RedirectError, RedirectErrorKind, Result,
    TransportError, TransportErrorKind,
};
