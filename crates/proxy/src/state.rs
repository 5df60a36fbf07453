// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared proxy state and the per-client registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::response::Response;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::pacing::{Pacing, PacingParams};
use crate::upstream::UpstreamTarget;
use crate::worker;

/// Shared proxy state: the client registry plus everything workers need.
pub struct ProxyState {
    pub clients: RwLock<HashMap<String, Arc<ClientState>>>,
    pub config: ProxyConfig,
    pub params: PacingParams,
    pub target: UpstreamTarget,
    pub http: reqwest::Client,
    pub shutdown: CancellationToken,
}

impl ProxyState {
    pub fn new(
        config: ProxyConfig,
        target: UpstreamTarget,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.upstream_timeout())
            .timeout(config.upstream_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let params = PacingParams::new(config.window, config.target);
        Ok(Self {
            clients: RwLock::new(HashMap::new()),
            config,
            params,
            target,
            http,
            shutdown,
        })
    }
}

/// Pacing and admission state for one client key.
pub struct ClientState {
    pub key: String,
    /// Bounded event queue; capacity equals the admission bound.
    pub tx: mpsc::Sender<RequestEvent>,
    /// Events admitted and not yet completed. `0 ≤ queued ≤ concurrency`.
    pub queued: AtomicU32,
    /// Mutated only by this client's worker after creation; the reaper
    /// reads `ttlast` to decide removal.
    pub pacing: RwLock<Pacing>,
    /// Cancelled by the reaper on removal; the worker exits on it.
    pub cancel: CancellationToken,
}

impl ClientState {
    /// Claim an admission slot unless the bound is already reached.
    pub fn try_admit(&self, limit: u32) -> bool {
        self.queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                (queued < limit).then_some(queued + 1)
            })
            .is_ok()
    }

    /// Release an admission slot.
    pub fn release(&self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }

    /// Whether no events are waiting in the queue. An event currently being
    /// serviced has already left the queue and is not counted here.
    pub fn queue_is_empty(&self) -> bool {
        self.tx.capacity() == self.tx.max_capacity()
    }
}

/// One admitted request awaiting service by the client's worker.
pub struct RequestEvent {
    pub request: Request,
    /// Response sink and completion signal in one: the admitting handler
    /// awaits the receiver, and a dropped receiver means the inbound
    /// request was aborted.
    pub respond: oneshot::Sender<Response>,
    pub enqueued: Instant,
}

/// Return the state for `key`, creating it and spawning its worker on first
/// admission. Double-checked so racing admissions for the same key observe
/// exactly one state and one worker.
pub async fn client_state(state: &Arc<ProxyState>, key: &str) -> Arc<ClientState> {
    if let Some(client) = state.clients.read().await.get(key) {
        return Arc::clone(client);
    }

    let mut clients = state.clients.write().await;
    if let Some(client) = clients.get(key) {
        return Arc::clone(client);
    }

    let (tx, rx) = mpsc::channel(state.config.concurrency);
    let client = Arc::new(ClientState {
        key: key.to_owned(),
        tx,
        queued: AtomicU32::new(0),
        pacing: RwLock::new(Pacing::default()),
        cancel: CancellationToken::new(),
    });
    clients.insert(key.to_owned(), Arc::clone(&client));
    worker::spawn_worker(Arc::clone(state), Arc::clone(&client), rx);
    client
}
