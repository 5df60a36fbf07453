// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream target parsing and the request forwarder.

use anyhow::Context;
use axum::body::{Body, BodyDataStream};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, Method};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Url;
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::state::ProxyState;

/// The single configured upstream origin.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    /// Base URL, plain HTTP.
    pub base: Url,
    /// `host:port` used for the outbound `Host` header.
    pub authority: String,
}

impl UpstreamTarget {
    /// Accepts `host:port` or `http://host:port[/prefix]`. The scheme is
    /// stripped and re-applied; a trailing `/` is appended when no path
    /// separator is present.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let stripped = raw.strip_prefix("http://").unwrap_or(raw);
        let (authority, full) = match stripped.find('/') {
            Some(i) => (stripped[..i].to_owned(), stripped.to_owned()),
            None => (stripped.to_owned(), format!("{stripped}/")),
        };
        anyhow::ensure!(!authority.is_empty(), "upstream {raw:?} has no authority");

        let base = Url::parse(&format!("http://{full}"))
            .with_context(|| format!("invalid upstream URL {raw:?}"))?;
        anyhow::ensure!(base.host_str().is_some(), "upstream {raw:?} has no host");

        Ok(Self { base, authority })
    }
}

/// Headers not copied verbatim onto the outbound request: `Host` is replaced
/// by the upstream authority, and the framing headers are re-derived for the
/// re-streamed body.
const SKIPPED_REQUEST_HEADERS: [HeaderName; 4] =
    [header::HOST, header::CONTENT_LENGTH, header::TRANSFER_ENCODING, header::CONNECTION];

const SKIPPED_RESPONSE_HEADERS: [HeaderName; 2] =
    [header::TRANSFER_ENCODING, header::CONNECTION];

/// Forward an inbound request to the configured upstream.
///
/// Returns the status code to record plus the response for the client.
/// Redirects pass through unfollowed; timeouts map to 408, other transport
/// failures to 503, and request-construction failures to 500. A `buffered`
/// body (the debug-label peek) is reused instead of the consumed inbound
/// stream.
pub async fn forward(
    state: &ProxyState,
    request: Request,
    buffered: Option<Bytes>,
) -> (u16, Response) {
    let (parts, body) = request.into_parts();

    let mut url = state.target.base.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let outbound_body = match buffered {
        Some(bytes) => reqwest::Body::from(bytes),
        None if parts.method == Method::POST => {
            reqwest::Body::wrap_stream(capped(body.into_data_stream(), state.config.maxbytes))
        }
        None => reqwest::Body::wrap_stream(body.into_data_stream()),
    };

    let mut headers = HeaderMap::with_capacity(parts.headers.len());
    for (name, value) in &parts.headers {
        if !SKIPPED_REQUEST_HEADERS.contains(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    let outbound = state
        .http
        .request(parts.method.clone(), url)
        .headers(headers)
        .header(header::HOST, state.target.authority.as_str())
        .body(outbound_body)
        .build();

    let outbound = match outbound {
        Ok(outbound) => outbound,
        Err(e) => {
            warn!(err = %e, "failed to build upstream request");
            return (500, ProxyError::Internal.into_response());
        }
    };

    match state.http.execute(outbound).await {
        Ok(upstream_response) => {
            let status = upstream_response.status();

            let mut headers = HeaderMap::with_capacity(upstream_response.headers().len());
            for (name, value) in upstream_response.headers() {
                if !SKIPPED_RESPONSE_HEADERS.contains(name) {
                    headers.append(name.clone(), value.clone());
                }
            }

            let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
            *response.status_mut() = status;
            *response.headers_mut() = headers;
            (status.as_u16(), response)
        }
        Err(e) if e.is_timeout() => (408, ProxyError::UpstreamTimeout.into_response()),
        Err(e) => {
            debug!(err = %e, "upstream transport error");
            (503, ProxyError::Unavailable.into_response())
        }
    }
}

/// Fail the body read past `limit` bytes instead of buffering silently.
fn capped(
    stream: BodyDataStream,
    limit: usize,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> {
    let mut remaining = limit;
    stream.map(move |chunk| match chunk {
        Ok(chunk) => {
            if chunk.len() > remaining {
                remaining = 0;
                Err(std::io::Error::other("request body exceeds maxbytes"))
            } else {
                remaining -= chunk.len();
                Ok(chunk)
            }
        }
        Err(e) => Err(std::io::Error::other(e)),
    })
}

#[cfg(test)]
#[path = "upstream_tests.rs"]
mod tests;
