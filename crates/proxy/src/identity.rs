// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client identity extraction.
//!
//! Pacing state is partitioned by a client key derived from, in order:
//! `Cf-Connecting-Ip`, the first `X-Forwarded-For` hop, then the peer
//! address. Extraction never fails; empty values are treated as absent.

use std::net::SocketAddr;

use axum::http::HeaderMap;

pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = header_value(headers, "cf-connecting-ip") {
        return ip;
    }

    if let Some(ip) = forwarded_for(headers) {
        return ip;
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_owned(),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_owned())
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
