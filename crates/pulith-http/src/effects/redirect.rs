use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::core::{Scheme, follows_location, resolve_location};
use crate::data::{NormalizedPayload, RequestSpec};
use crate::error::{RedirectError, RedirectErrorKind, Result};

use super::dispatch::dispatch;
use super::transport::{Response, Transport};

/// Time allowed to drain the body of a redirect response before it is
/// destroyed.
const DISCARD_WINDOW: Duration = Duration::from_millis(500);

/// Progress through a redirect chain.
#[derive(Debug)]
pub struct RedirectState {
    remaining: u32,
    hops: u32,
    spec: RequestSpec,
}

impl RedirectState {
    pub fn new(spec: RequestSpec) -> Self {
        Self {
            remaining: spec.redirects,
            hops: 0,
            spec,
        }
    }

    /// Hops still allowed.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Hops taken so far.
    pub fn hops(&self) -> u32 {
        self.hops
    }

    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }

    /// URL the next dispatch goes to; relative locations resolve against it.
    pub fn url(&self) -> &Url {
        &self.spec.url
    }

    /// Retarget the request at `location` after a redirect with `status`.
    ///
    /// Method, headers, and payload carry over unchanged.
    pub fn advance(
        &mut self,
        status: u16,
        location: Option<&str>,
    ) -> std::result::Result<(), RedirectError> {
        let fail = |kind| RedirectError::new(kind, status, self.spec.url.as_str());

        let location = location.ok_or_else(|| fail(RedirectErrorKind::LocationMissing))?;
        let next = resolve_location(&self.spec.url, location)
            .ok_or_else(|| fail(RedirectErrorKind::InvalidLocation))?;
        if self.remaining == 0 {
            return Err(fail(RedirectErrorKind::MaxRedirectsExceeded));
        }
        if let NormalizedPayload::Stream(stream) = &self.spec.payload {
            if !stream.is_replayable() {
                return Err(fail(RedirectErrorKind::PayloadNotReplayable));
            }
        }
        let scheme = Scheme::of(&next).map_err(|_| fail(RedirectErrorKind::InvalidLocation))?;

        self.remaining -= 1;
        self.hops += 1;
        self.spec.scheme = scheme;
        self.spec.url = next;
        Ok(())
    }

    pub fn into_spec(self) -> RequestSpec {
        self.spec
    }
}

/// Dispatch `spec`, following redirects until a terminal response.
///
/// With a budget of zero the first response is returned whatever its
/// status. Otherwise every redirect body is discarded before the next hop,
/// and the chain fails once the budget is spent.
pub async fn follow_redirects<T: Transport>(transport: &T, spec: RequestSpec) -> Result<Response> {
    let following = spec.redirects > 0;
    let mut state = RedirectState::new(spec);

    loop {
        let response = dispatch(transport, state.spec()).await?;
        let status = response.status().as_u16();
        let location = response.location().map(str::to_owned);
        if !following || !follows_location(status, location.is_some()) {
            return Ok(response);
        }

        response.into_body().discard(DISCARD_WINDOW).await;
        state.advance(status, location.as_deref())?;
        debug!(
            status,
            hop = state.hops(),
            remaining = state.remaining(),
            url = %state.url(),
            "following redirect"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ClientConfig, Payload, PayloadStream, RequestOptions};
    use bytes::Bytes;
    use futures_util::StreamExt;

    fn state(options: RequestOptions) -> RedirectState {
        let spec = RequestSpec::new(
            "post",
            "http://localhost/a/b",
            options,
            &ClientConfig::default(),
        )
        .unwrap();
        RedirectState::new(spec)
    }

    #[test]
    fn advance_resolves_relative_locations() {
        let mut state = state(RequestOptions::default().redirects(2));
        state.advance(302, Some("c?x=1")).unwrap();
        assert_eq!(state.url().as_str(), "http://localhost/a/c?x=1");
        assert_eq!(state.remaining(), 1);
        assert_eq!(state.hops(), 1);
        assert_eq!(state.spec().method, http::Method::POST);
    }

    #[test]
    fn missing_location_is_checked_before_budget() {
        let mut state = state(RequestOptions::default().redirects(0));
        let err = state.advance(301, None).unwrap_err();
        assert_eq!(err.kind(), RedirectErrorKind::LocationMissing);
        assert_eq!(err.status(), 301);
    }

    #[test]
    fn spent_budget_fails() {
        let mut state = state(RequestOptions::default().redirects(1));
        state.advance(301, Some("/x")).unwrap();
        let err = state.advance(301, Some("/y")).unwrap_err();
        assert_eq!(err.kind(), RedirectErrorKind::MaxRedirectsExceeded);
        assert_eq!(err.url(), "http://localhost/x");
    }

    #[test]
    fn unusable_location_is_rejected() {
        let mut state = state(RequestOptions::default().redirects(3));
        let err = state.advance(302, Some("ftp://files.example/")).unwrap_err();
        assert_eq!(err.kind(), RedirectErrorKind::InvalidLocation);
    }

    #[test]
    fn https_location_switches_scheme() {
        let mut state = state(RequestOptions::default().redirects(3));
        state.advance(308, Some("https://secure.example/")).unwrap();
        assert_eq!(state.spec().scheme, Scheme::Https);
    }

    #[tokio::test]
    async fn started_stream_is_not_replayed() {
        let source = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
            b"chunk",
        ))]);
        let stream = PayloadStream::new(source);
        let mut state = state(
            RequestOptions::default()
                .redirects(3)
                .payload(Payload::Stream(stream.clone())),
        );

        let mut reader = stream.reader().unwrap();
        let _ = reader.next().await;

        let err = state.advance(307, Some("/again")).unwrap_err();
        assert_eq!(err.kind(), RedirectErrorKind::PayloadNotReplayable);
    }
}
