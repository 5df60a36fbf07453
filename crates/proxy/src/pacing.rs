// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pacing arithmetic: decayed per-client service-time accounting and the
//! pre-service delay computation.
//!
//! Both steps are pure functions of `(previous state, now)` so the whole
//! update law is testable without any concurrency around it. The worker owns
//! all mutation; callers apply the returned state under the client's lock.

use std::time::Instant;

/// Delays at or below this many seconds are not worth suspending for.
pub const DELAY_FLOOR: f64 = 0.001;

/// Window-derived constants, fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct PacingParams {
    /// Sliding window in seconds.
    pub window: f64,
    /// `window / target`: how much recent upstream cost is amplified when
    /// deriving the inter-arrival spacing a client has earned.
    pub quant: f64,
}

impl PacingParams {
    pub fn new(window: f64, target: f64) -> Self {
        Self { window, quant: window / target }
    }
}

/// Decayed pacing accumulators for one client.
///
/// `ttlast` is the most recent pacing-decision point, absent on a fresh
/// state. `cclast` is the decayed sum of recent upstream service seconds and
/// `ddlast` the smoothed recently inserted delay; both are non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pacing {
    pub ttlast: Option<Instant>,
    pub cclast: f64,
    pub ddlast: f64,
}

fn elapsed_secs(pacing: &Pacing, now: Instant) -> f64 {
    match pacing.ttlast {
        Some(ttlast) => now.saturating_duration_since(ttlast).as_secs_f64(),
        None => 0.0,
    }
}

/// Compute the pre-service delay in seconds and the advanced state.
///
/// Within the window the accumulators fade linearly with elapsed time, the
/// earned gap is `cclast * (quant - 1)`, and the inserted delay is the
/// average of the previous smoothed delay and the still-uncovered part of
/// the gap (capped at one window). A full window of silence resets the
/// accumulators entirely.
pub fn pre_service(prev: Pacing, now: Instant, params: &PacingParams) -> (f64, Pacing) {
    let ttdiff = elapsed_secs(&prev, now);
    let mut next = prev;
    let delay;

    if ttdiff < params.window {
        let fading = 1.0 - ttdiff / params.window;
        next.cclast *= fading;
        next.ddlast *= fading;

        let target_gap = next.cclast * (params.quant - 1.0);
        let raw = if ttdiff > target_gap {
            0.0
        } else {
            (target_gap - ttdiff).min(params.window)
        };

        delay = (next.ddlast + raw) / 2.0;
        next.ddlast = delay;
    } else {
        next.cclast = 0.0;
        next.ddlast = 0.0;
        delay = 0.0;
    }

    next.ttlast = Some(now);
    (delay, next)
}

/// Fold a measured upstream service time `cc` (seconds) into the state.
pub fn post_service(prev: Pacing, now: Instant, cc: f64, params: &PacingParams) -> Pacing {
    let ttdiff = elapsed_secs(&prev, now);
    let mut next = prev;

    if ttdiff < params.window {
        let fading = 1.0 - ttdiff / params.window;
        next.cclast *= fading;
        next.ddlast *= fading;
    } else {
        next.cclast = 0.0;
        next.ddlast = 0.0;
    }

    next.cclast += cc;
    next.ttlast = Some(now);
    next
}

#[cfg(test)]
#[path = "pacing_tests.rs"]
mod tests;
