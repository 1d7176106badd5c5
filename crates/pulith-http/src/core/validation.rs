use http::Method;
use url::Url;

use crate::error::{Error, Result};

/// Returns `true` if the HTTP status code indicates a redirect.
///
/// # Recognized Redirect Codes
///
/// - 301: Moved Permanently
/// - 302: Found
/// - 303: See Other
/// - 307: Temporary Redirect
/// - 308: Permanent Redirect
///
/// # Examples
///
/// ```
/// use pulith_http::core::is_redirect;
///
/// assert!(is_redirect(301));
/// assert!(is_redirect(302));
/// assert!(!is_redirect(200));
/// assert!(!is_redirect(404));
/// ```
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Whether a response should be followed to its `Location`.
///
/// The recognized redirect codes are always followed. Any other 3xx except
/// 304 is followed only when it names a location.
pub fn follows_location(status: u16, has_location: bool) -> bool {
    is_redirect(status) || ((300..400).contains(&status) && status != 304 && has_location)
}

/// Transport selected by the target URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn of(url: &Url) -> Result<Self> {
        match url.scheme() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(Error::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            }),
        }
    }

    pub fn is_secure(self) -> bool {
        self == Scheme::Https
    }
}

/// Upper-case and validate an HTTP method token.
pub fn normalize_method(method: &str) -> Result<Method> {
    let upper = method.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(Error::InvalidMethod(method.to_owned()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| Error::InvalidMethod(method.to_owned()))
}

/// Parse an absolute `http` or `https` URL with a host.
pub fn parse_target(target: &str) -> Result<Url> {
    let url = Url::parse(target.trim()).map_err(|e| Error::InvalidUrl {
        url: target.to_owned(),
        reason: e.to_string(),
    })?;
    Scheme::of(&url)?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl {
            url: target.to_owned(),
            reason: "missing host".into(),
        });
    }
    Ok(url)
}

/// Resolve a `Location` value against the URL that produced it.
///
/// Returns `None` when the result is not an `http` or `https` URL.
pub fn resolve_location(base: &Url, location: &str) -> Option<Url> {
    let next = base.join(location.trim()).ok()?;
    Scheme::of(&next).ok()?;
    next.host_str()?;
    Some(next)
}

/// `application/json` or any `+json` structured syntax suffix.
pub fn is_json_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let Some((kind, subtype)) = essence.split_once('/') else {
        return false;
    };
    kind == "application" && (subtype == "json" || subtype.ends_with("+json"))
}
