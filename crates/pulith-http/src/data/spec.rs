use std::collections::HashSet;
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use url::Url;

use crate::core::{Scheme, normalize_method, parse_target};
use crate::effects::Agent;
use crate::error::{Error, Result};

use super::options::{ClientConfig, Downstream, RequestOptions};
use super::payload::{NormalizedPayload, normalize};

/// A request with every option resolved against the client configuration.
///
/// This is the unit the dispatcher sends and the redirect loop rewrites
/// between hops.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub scheme: Scheme,
    pub headers: HeaderMap,
    pub payload: NormalizedPayload,
    pub agent: Option<Agent>,
    pub verify_tls: bool,
    pub timeout: Option<Duration>,
    pub redirects: u32,
    pub downstream: Option<Downstream>,
}

impl RequestSpec {
    pub fn new(
        method: &str,
        url: &str,
        options: RequestOptions,
        config: &ClientConfig,
    ) -> Result<Self> {
        let method = normalize_method(method)?;
        let url = parse_target(url)?;
        let scheme = Scheme::of(&url)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            headers.insert(header_name(name)?, header_value(name, value)?);
        }
        let mut overridden = HashSet::new();
        for (name, value) in &options.headers {
            let name_key = header_name(name)?;
            let value = header_value(name, value)?;
            if overridden.insert(name_key.clone()) {
                headers.insert(name_key, value);
            } else {
                headers.append(name_key, value);
            }
        }

        Ok(Self {
            method,
            url,
            scheme,
            headers,
            payload: normalize(options.payload),
            agent: options.agent,
            verify_tls: options
                .reject_unauthorized
                .unwrap_or(config.reject_unauthorized),
            timeout: options.timeout.or_else(|| config.timeout()),
            redirects: options.redirects.unwrap_or(config.redirects),
            downstream: options.downstream,
        })
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| Error::InvalidHeader {
        name: name.to_owned(),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader {
        name: name.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::USER_AGENT;

    fn spec(options: RequestOptions, config: &ClientConfig) -> RequestSpec {
        RequestSpec::new("post", "http://localhost:8080/items", options, config).unwrap()
    }

    #[test]
    fn method_is_upper_cased() {
        let spec = spec(RequestOptions::default(), &ClientConfig::default());
        assert_eq!(spec.method, Method::POST);
        assert_eq!(spec.scheme, Scheme::Http);
    }

    #[test]
    fn request_headers_override_configured_defaults() {
        let mut config = ClientConfig::default();
        config.headers.insert("User-Agent".into(), "default".into());
        config.headers.insert("x-team".into(), "core".into());

        let options = RequestOptions::default().header("user-agent", "sample-agent/1.0");
        let spec = spec(options, &config);
        assert_eq!(spec.headers.get(USER_AGENT).unwrap(), "sample-agent/1.0");
        assert_eq!(spec.headers.get("x-team").unwrap(), "core");
    }

    #[test]
    fn repeated_request_headers_are_kept() {
        let options = RequestOptions::default()
            .header("accept", "text/html")
            .header("Accept", "application/json");
        let spec = spec(options, &ClientConfig::default());
        assert_eq!(spec.headers.get_all("accept").iter().count(), 2);
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let err = RequestSpec::new(
            "get",
            "http://localhost/",
            RequestOptions::default().header("bad header", "x"),
            &ClientConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { .. }));
    }

    #[test]
    fn options_fall_back_to_config() {
        let config = ClientConfig {
            redirects: 4,
            timeout_ms: Some(50),
            reject_unauthorized: false,
            ..ClientConfig::default()
        };
        let spec = spec(RequestOptions::default(), &config);
        assert_eq!(spec.redirects, 4);
        assert_eq!(spec.timeout, Some(Duration::from_millis(50)));
        assert!(!spec.verify_tls);

        let spec = RequestSpec::new(
            "get",
            "https://localhost/",
            RequestOptions::default().redirects(0).reject_unauthorized(true),
            &config,
        )
        .unwrap();
        assert_eq!(spec.redirects, 0);
        assert!(spec.verify_tls);
        assert_eq!(spec.scheme, Scheme::Https);
    }
}
