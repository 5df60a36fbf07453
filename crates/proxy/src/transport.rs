// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound HTTP surface: the catch-all router and the admission front end.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use crate::error::ProxyError;
use crate::identity;
use crate::state::{client_state, ClientState, ProxyState, RequestEvent};

/// Build the router: every path and method lands in the admission handler.
pub fn build_router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .fallback(admit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Holds one unit of a client's admission quota; released on drop so an
/// aborted inbound request cannot leak its slot.
struct QueuedSlot(Arc<ClientState>);

impl Drop for QueuedSlot {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Admission front end: method allow-list, per-client queue cap, enqueue,
/// then wait for the worker to complete the event.
async fn admit(State(state): State<Arc<ProxyState>>, mut request: Request) -> Response {
    let method = request.method();
    if method != Method::GET && method != Method::POST && method != Method::OPTIONS {
        return ProxyError::MethodNotAllowed.into_response();
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect| connect.0);
    let key = identity::client_key(request.headers(), peer);

    let limit = state.config.concurrency as u32;
    loop {
        let client = client_state(&state, &key).await;

        if !client.try_admit(limit) {
            return ProxyError::TooManyRequests.into_response();
        }
        let _slot = QueuedSlot(Arc::clone(&client));

        let (respond, response) = oneshot::channel();
        let event = RequestEvent { request, respond, enqueued: Instant::now() };

        match client.tx.try_send(event) {
            Ok(()) => {
                return match response.await {
                    Ok(response) => response,
                    // Worker shut down with the event still queued.
                    Err(_) => ProxyError::Unavailable.into_response(),
                };
            }
            // The state was reaped between lookup and push; a fresh lookup
            // recreates it, and a recreated state stays live for a window.
            Err(TrySendError::Closed(event)) => {
                request = event.request;
            }
            // Queue capacity equals the admission bound, so a successful
            // try_admit leaves room; kept as a non-panicking backstop.
            Err(TrySendError::Full(_)) => {
                return ProxyError::TooManyRequests.into_response();
            }
        }
    }
}
