//! Data types for HTTP requests.
//!
//! This module contains the request and read options, the payload
//! representations, client configuration, and the resolved [`RequestSpec`]
//! that the dispatcher and redirect loop operate on.

pub mod options;
pub mod payload;
pub mod readable;
pub mod spec;

pub use options::{ClientConfig, Downstream, JsonMode, ReadOptions, RequestOptions, ShortcutOptions};
pub use payload::{NormalizedPayload, Payload, PayloadReader, PayloadStream, StreamState, normalize};
pub use readable::{Encoding, ReadableStream, StreamSource, to_readable_stream};
pub use spec::RequestSpec;
