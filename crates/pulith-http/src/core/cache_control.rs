//! `Cache-Control` header parsing.
//!
//! ```text
//! Cache-Control   = 1#cache-directive
//! cache-directive = token [ "=" ( token / quoted-string ) ]
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

static DIRECTIVE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|\s*,\s*)([^\x00-\x20()<>@,;:\\"/\[\]?={}\x7F]+)(?:=(?:([^\x00-\x20()<>@,;:\\"/\[\]?={}\x7F]+)|"((?:[^"\\]|\\.)*)"))?"#).unwrap()
});

/// Directives whose value is a number of seconds.
const NUMERIC_DIRECTIVES: &[&str] = &[
    "max-age",
    "s-maxage",
    "max-stale",
    "min-fresh",
    "stale-while-revalidate",
    "stale-if-error",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Present without a value, e.g. `no-cache`.
    Flag,
    Seconds(u64),
    Token(String),
}

/// Parsed `Cache-Control` directives keyed by lower-cased name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheControl {
    directives: BTreeMap<String, Directive>,
}

impl CacheControl {
    pub fn get(&self, name: &str) -> Option<&Directive> {
        self.directives.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn seconds(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            Directive::Seconds(secs) => Some(*secs),
            _ => None,
        }
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.seconds("max-age").map(Duration::from_secs)
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Directive)> {
        self.directives.iter().map(|(name, d)| (name.as_str(), d))
    }
}

/// Parse a `Cache-Control` header value.
///
/// Returns `None` unless the entire value is well formed: any stray
/// character, empty directive, misplaced `=`, or non-numeric value for a
/// numeric directive rejects the whole header.
///
/// # Examples
///
/// ```
/// use pulith_http::{Directive, parse_cache_control};
///
/// let cc = parse_cache_control("must-revalidate, max-age=3600").unwrap();
/// assert_eq!(cc.get("must-revalidate"), Some(&Directive::Flag));
/// assert_eq!(cc.seconds("max-age"), Some(3600));
///
/// assert!(parse_cache_control("must-revalidate, b =3600").is_none());
/// ```
pub fn parse_cache_control(value: &str) -> Option<CacheControl> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let mut directives = BTreeMap::new();
    let mut cursor = 0;
    for caps in DIRECTIVE_REGEX.captures_iter(value) {
        let whole = caps.get(0)?;
        if whole.start() != cursor || (cursor == 0 && whole.as_str().starts_with(',')) {
            return None;
        }
        cursor = whole.end();

        let name = caps.get(1)?.as_str().to_ascii_lowercase();
        let raw = caps
            .get(2)
            .map(|m| m.as_str().to_owned())
            .or_else(|| caps.get(3).map(|m| unescape(m.as_str())));
        let numeric = NUMERIC_DIRECTIVES.contains(&name.as_str());

        let directive = match raw {
            None if numeric => return None,
            None => Directive::Flag,
            Some(v) if numeric => Directive::Seconds(parse_seconds(&v)?),
            Some(v) => Directive::Token(v.to_lowercase()),
        };
        directives.insert(name, directive);
    }

    (cursor == value.len()).then_some(CacheControl { directives })
}

fn parse_seconds(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Out-of-range delta-seconds saturate.
    Some(value.parse().unwrap_or(u64::MAX))
}

fn unescape(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
