// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! paceproxy: a reverse proxy that stretches each client's traffic over
//! time. Every client key gets a decayed estimate of its recent upstream
//! service time, and a computed delay before forwarding keeps that client's
//! long-run upstream occupancy near a configured target.

pub mod config;
pub mod error;
pub mod identity;
pub mod label;
pub mod pacing;
pub mod reaper;
pub mod state;
pub mod transport;
pub mod upstream;
pub mod worker;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ProxyConfig;
use crate::state::ProxyState;
use crate::upstream::UpstreamTarget;

/// Run the proxy until shutdown.
pub async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    anyhow::ensure!(config.window > 0.0, "window must be positive");
    anyhow::ensure!(config.target > 0.0, "target must be positive");
    anyhow::ensure!(config.concurrency > 0, "concurrency must be positive");

    let target = UpstreamTarget::parse(&config.upstream)?;
    let listen = config.listen.clone();
    let shutdown = CancellationToken::new();

    info!(
        "pacing {} -> {} (timeout: {}, window: {}, target: {}, concurrency: {}, maxbytes: {}, debug: {})",
        listen,
        config.upstream,
        config.timeout,
        config.window,
        config.target,
        config.concurrency,
        config.maxbytes,
        config.debug,
    );

    let state = Arc::new(ProxyState::new(config, target, shutdown.clone())?);
    reaper::spawn_reaper(Arc::clone(&state));

    let router = transport::build_router(state);
    let listener = TcpListener::bind(&listen).await?;
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
