// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable request labels for the per-request log line.

use axum::http::{Method, Uri};
use serde::Deserialize;

/// Best-effort peek at a JSON-RPC style POST body.
#[derive(Debug, Deserialize)]
struct MethodProbe {
    #[serde(default)]
    method: String,
}

/// Label a request for logging: the path (plus raw query), or for POST
/// bodies that parse as a JSON object with a non-empty string `method`,
/// that method name. Parse failures are non-fatal and fall back to a
/// `" (POST)"-suffixed path.
pub fn request_label(method: &Method, uri: &Uri, body: Option<&[u8]>) -> String {
    let path = uri.path();
    let mut label = if path.is_empty() { "/".to_owned() } else { path.to_owned() };
    if let Some(query) = uri.query() {
        label.push('?');
        label.push_str(query);
    }

    if *method == Method::POST {
        if let Some(bytes) = body {
            if !bytes.is_empty() {
                if let Ok(probe) = serde_json::from_slice::<MethodProbe>(bytes) {
                    if !probe.method.is_empty() {
                        return probe.method;
                    }
                }
            }
        }
        label.push_str(" (POST)");
    }

    label
}

#[cfg(test)]
#[path = "label_tests.rs"]
mod tests;
