use http::Method;
use http::header::{CONTENT_LENGTH, HeaderValue};
use tracing::{debug, warn};

use crate::data::{NormalizedPayload, RequestSpec};
use crate::error::{Error, Result, TransportError};

use super::deadline::{DeadlineError, with_deadline};
use super::transport::{OutgoingBody, Response, Transport, TransportRequest};

/// Issue exactly one HTTP exchange for `spec`.
///
/// The timeout covers waiting for an agent slot, connecting, sending the
/// body, and receiving the response headers. When it fires the in-flight
/// exchange is dropped with everything it holds.
pub async fn dispatch<T: Transport>(transport: &T, spec: &RequestSpec) -> Result<Response> {
    let body = outgoing_body(spec)?;
    let mut headers = spec.headers.clone();
    if let OutgoingBody::Full(bytes) = &body {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    }

    let request = TransportRequest {
        method: spec.method.clone(),
        url: spec.url.clone(),
        scheme: spec.scheme,
        headers,
        body,
        verify_tls: spec.verify_tls,
    };
    debug!(method = %spec.method, url = %spec.url, "dispatching request");

    let agent = spec.agent.as_ref();
    let exchange = async move {
        let lease = match agent {
            Some(agent) => Some(agent.checkout().await),
            None => None,
        };
        let mut response = transport.send(request).await?;
        if let Some(lease) = lease {
            response.body_mut().attach_lease(lease);
        }
        Ok::<_, TransportError>(response)
    };

    let mut response = match with_deadline(exchange, spec.timeout).await {
        Ok(response) => response,
        Err(DeadlineError::Elapsed(after)) => {
            warn!(url = %spec.url, timeout_ms = after.as_millis() as u64, "request timed out");
            return Err(TransportError::timeout(after).into());
        }
        Err(DeadlineError::Failed(e)) => {
            debug!(url = %spec.url, code = e.code(), "request failed");
            return Err(e.into());
        }
    };

    debug!(url = %spec.url, status = response.status().as_u16(), "response received");
    response.set_downstream(spec.downstream.clone());
    Ok(response)
}

fn outgoing_body(spec: &RequestSpec) -> Result<OutgoingBody> {
    if spec.method == Method::HEAD {
        return Ok(OutgoingBody::Empty);
    }
    match &spec.payload {
        NormalizedPayload::Absent => Ok(OutgoingBody::Empty),
        NormalizedPayload::Bytes(bytes) => Ok(OutgoingBody::Full(bytes.clone())),
        NormalizedPayload::Stream(stream) => stream
            .reader()
            .map(OutgoingBody::Stream)
            .ok_or_else(|| Error::InvalidPayload("stream payload was already consumed".into())),
    }
}
