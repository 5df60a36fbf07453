// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-client worker: drains one client's queue in arrival order, applying
//! the pacing delay before each upstream call.
//!
//! A single worker per client is what serializes pacing decisions and caps
//! concurrent upstream work at one request per key; the pacing fields need
//! no further locking discipline because only this task writes them.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::Method;
use axum::response::IntoResponse;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::ProxyError;
use crate::label;
use crate::pacing;
use crate::state::{ClientState, ProxyState, RequestEvent};
use crate::upstream;

/// Spawn the single worker for a freshly created client state.
pub fn spawn_worker(
    state: Arc<ProxyState>,
    client: Arc<ClientState>,
    mut queue: mpsc::Receiver<RequestEvent>,
) {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = client.cancel.cancelled() => break,
                event = queue.recv() => match event {
                    Some(event) => event,
                    None => return,
                },
            };
            serve(&state, &client, event).await;
        }

        // Removed from the registry: refuse further pushes, then serve
        // whatever raced in before the close so nothing admitted is lost.
        queue.close();
        while let Some(event) = queue.recv().await {
            serve(&state, &client, event).await;
        }
    });
}

/// Inbound body after the optional debug peek.
enum BodyPrep {
    /// Body left in the request, streamed straight through.
    Streamed,
    /// Body fully read for labelling; forwarded from the buffer.
    Buffered(Bytes),
    /// Body read failed with the client still connected (over the cap);
    /// the upstream call fails with it.
    Failed,
}

async fn serve(state: &ProxyState, client: &ClientState, event: RequestEvent) {
    let RequestEvent { mut request, mut respond, .. } = event;

    // Peek the body for the log label only when debug logging needs it;
    // POST bodies are bounded by maxbytes so the buffering is too.
    let mut label = None;
    let mut body = BodyPrep::Streamed;
    if state.config.debug {
        let plain = label::request_label(request.method(), request.uri(), None);
        if request.method() == Method::POST {
            let taken = std::mem::take(request.body_mut());
            let peeked = tokio::select! {
                peeked = axum::body::to_bytes(taken, state.config.maxbytes) => peeked,
                _ = respond.closed() => {
                    // Disconnected mid-upload: no response, no state update.
                    log_line(state, client, 0, 0.0, Some(&plain)).await;
                    return;
                }
            };
            match peeked {
                Ok(bytes) => {
                    label =
                        Some(label::request_label(request.method(), request.uri(), Some(&bytes)));
                    body = BodyPrep::Buffered(bytes);
                }
                // A failed read with the client gone is a disconnect, not an
                // oversized body.
                Err(_) if respond.is_closed() => {
                    log_line(state, client, 0, 0.0, Some(&plain)).await;
                    return;
                }
                Err(_) => {
                    label = Some(plain);
                    body = BodyPrep::Failed;
                }
            }
        } else {
            label = Some(plain);
        }
    }

    // Pre-service pacing step.
    let now = Instant::now();
    let prev = *client.pacing.read().await;
    let (delay, next) = pacing::pre_service(prev, now, &state.params);
    *client.pacing.write().await = next;

    if delay > pacing::DELAY_FLOOR {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(delay)) => {}
            _ = respond.closed() => {
                // Aborted while stretched: no upstream call, state keeps
                // the pre-service update.
                log_line(state, client, 0, 0.0, label.as_deref()).await;
                return;
            }
        }
    }

    let before = Instant::now();
    let outcome = match body {
        BodyPrep::Failed => Some((503, ProxyError::Unavailable.into_response())),
        BodyPrep::Buffered(bytes) => {
            tokio::select! {
                outcome = upstream::forward(state, request, Some(bytes)) => Some(outcome),
                _ = respond.closed() => None,
            }
        }
        BodyPrep::Streamed => {
            tokio::select! {
                outcome = upstream::forward(state, request, None) => Some(outcome),
                _ = respond.closed() => None,
            }
        }
    };
    let cc = before.elapsed().as_secs_f64();

    match outcome {
        Some((status, response)) => {
            let now = Instant::now();
            let prev = *client.pacing.read().await;
            *client.pacing.write().await = pacing::post_service(prev, now, cc, &state.params);
            // Log before completing the event so the queued count still
            // includes this request when it is read.
            log_line(state, client, status, cc, label.as_deref()).await;
            let _ = respond.send(response);
        }
        None => {
            // Inbound client gone mid-upstream: nothing to emit, and the
            // partial service-time measurement is not folded in.
            log_line(state, client, 0, cc, label.as_deref()).await;
        }
    }
}

/// One line per completed or cancelled request:
/// `<key>: <status> (<queued>/<cclastMs>/<ddlastMs>/<ccMs>): <label>`.
async fn log_line(state: &ProxyState, client: &ClientState, status: u16, cc: f64, label: Option<&str>) {
    if !state.config.debug {
        return;
    }
    let pacing = *client.pacing.read().await;
    info!(
        "{}: {} ({}/{}/{}/{}): {}",
        client.key,
        status,
        client.queued.load(Ordering::Relaxed),
        (1000.0 * pacing.cclast) as i64,
        (1000.0 * pacing.ddlast) as i64,
        (1000.0 * cc) as i64,
        label.unwrap_or("-"),
    );
}
