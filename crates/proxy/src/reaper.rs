// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background sweep that removes client states idle for a full window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::pacing::Pacing;
use crate::state::ProxyState;

/// Spawn the periodic reaper; the sweep period is one window.
pub fn spawn_reaper(state: Arc<ProxyState>) {
    let window = state.config.window_duration();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(window);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            reap(&state, Instant::now(), window).await;
        }
    });
}

/// Remove every client whose queue is empty and whose last pacing decision
/// is older than `window`. Candidates are collected under the shared lock
/// and re-verified under the exclusive lock: an admission may refill a
/// queue between the two phases.
pub async fn reap(state: &ProxyState, now: Instant, window: Duration) {
    let candidates: Vec<String> = {
        let clients = state.clients.read().await;
        let mut keys = Vec::new();
        for (key, client) in clients.iter() {
            if client.queue_is_empty() && is_stale(&*client.pacing.read().await, now, window) {
                keys.push(key.clone());
            }
        }
        keys
    };

    if candidates.is_empty() {
        return;
    }

    let mut clients = state.clients.write().await;
    for key in candidates {
        let verified = match clients.get(&key) {
            Some(client) => {
                client.queue_is_empty() && is_stale(&*client.pacing.read().await, now, window)
            }
            None => false,
        };
        if verified {
            if let Some(client) = clients.remove(&key) {
                client.cancel.cancel();
                debug!(key = %client.key, "reaped idle client state");
            }
        }
    }
}

/// A state with no pacing decision yet counts as stale; it is only ever
/// observed reapable in the instant between creation and first enqueue.
fn is_stale(pacing: &Pacing, now: Instant, window: Duration) -> bool {
    match pacing.ttlast {
        Some(ttlast) => now.saturating_duration_since(ttlast) > window,
        None => true,
    }
}
