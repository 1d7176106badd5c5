//! Pure transformations for HTTP requests.
//!
//! Nothing in this module performs I/O: header grammars, status
//! classification, method and URL validation.

mod cache_control;
mod validation;

pub use cache_control::{CacheControl, Directive, parse_cache_control};
pub use validation::{
    Scheme, follows_location, is_json_media_type, is_redirect, normalize_method, parse_target,
    resolve_location,
};
