// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the pacing proxy.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "paceproxy", about = "Per-client adaptive pacing reverse proxy")]
pub struct ProxyConfig {
    /// Bind address of the inbound HTTP server.
    #[arg(long, default_value = "127.0.0.1:8080", env = "PACEPROXY_LISTEN")]
    pub listen: String,

    /// Upstream origin (`host:port` or `http://host:port`).
    #[arg(long, default_value = "127.0.0.1:80", env = "PACEPROXY_UPSTREAM")]
    pub upstream: String,

    /// Upstream dial and overall request deadline in seconds.
    #[arg(long, default_value_t = 12, env = "PACEPROXY_TIMEOUT")]
    pub timeout: u64,

    /// Sliding window in seconds; also the reaper period.
    #[arg(long, default_value_t = 12.0, env = "PACEPROXY_WINDOW")]
    pub window: f64,

    /// Target upstream occupancy per client, in seconds per window.
    #[arg(long, default_value_t = 4.0, env = "PACEPROXY_TARGET")]
    pub target: f64,

    /// Maximum simultaneously queued requests per client.
    #[arg(long, default_value_t = 64, env = "PACEPROXY_CONCURRENCY")]
    pub concurrency: usize,

    /// Hard cap on inbound POST body size in bytes.
    #[arg(long, default_value_t = 65536, env = "PACEPROXY_MAXBYTES")]
    pub maxbytes: usize,

    /// Emit a per-request log line.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, env = "PACEPROXY_DEBUG")]
    pub debug: bool,
}

impl ProxyConfig {
    pub fn upstream_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout)
    }

    pub fn window_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.window)
    }
}
