// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Statuses the proxy produces itself, as opposed to upstream statuses
/// which pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyError {
    MethodNotAllowed,
    TooManyRequests,
    UpstreamTimeout,
    Unavailable,
    Internal,
}

impl ProxyError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::TooManyRequests => "Too Many Requests",
            Self::UpstreamTimeout => "Upstream Timeout",
            Self::Unavailable => "Upstream Error",
            Self::Internal => "Internal Server Error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.http_status(), self.reason()).into_response()
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}
