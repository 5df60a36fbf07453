// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

const EPS: f64 = 1e-9;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}

// ── pre_service ───────────────────────────────────────────────────────

#[test]
fn fresh_state_sees_zero_delay() {
    let params = PacingParams::new(12.0, 4.0);
    let now = Instant::now();

    let (delay, next) = pre_service(Pacing::default(), now, &params);

    assert_eq!(delay, 0.0);
    assert_eq!(next.ttlast, Some(now));
    assert_eq!(next.cclast, 0.0);
    assert_eq!(next.ddlast, 0.0);
}

#[test]
fn warmed_state_is_smoothed_toward_earned_gap() {
    // window 10, target 2 -> quant 5. With 0.4s of recent cost and no
    // elapsed time, the earned gap is 0.4 * 4 = 1.6s and the smoothed
    // delay is (0 + 1.6) / 2 = 0.8s.
    let params = PacingParams::new(10.0, 2.0);
    let now = Instant::now();
    let prev = Pacing { ttlast: Some(now), cclast: 0.4, ddlast: 0.0 };

    let (delay, next) = pre_service(prev, now, &params);

    assert!(approx(delay, 0.8), "delay = {delay}");
    assert!(approx(next.ddlast, 0.8));
    assert!(approx(next.cclast, 0.4));
}

#[test]
fn covered_gap_yields_zero_raw_delay() {
    // Elapsed time beyond the earned gap means no raw delay; the smoothed
    // delay is just half the faded previous delay.
    let params = PacingParams::new(10.0, 2.0);
    let t0 = Instant::now();
    let now = t0 + Duration::from_secs(5);
    let prev = Pacing { ttlast: Some(t0), cclast: 0.1, ddlast: 0.0 };

    // gap = 0.1 * 0.5 * 4 = 0.2 < ttdiff = 5
    let (delay, _) = pre_service(prev, now, &params);
    assert_eq!(delay, 0.0);
}

#[test]
fn raw_delay_is_clamped_to_window() {
    let params = PacingParams::new(10.0, 2.0);
    let now = Instant::now();
    let prev = Pacing { ttlast: Some(now), cclast: 100.0, ddlast: 0.0 };

    // gap = 400 clamps to the 10s window before smoothing.
    let (delay, next) = pre_service(prev, now, &params);
    assert!(approx(delay, 5.0), "delay = {delay}");
    assert!(approx(next.ddlast, 5.0));
}

#[test]
fn full_window_of_silence_resets_state() {
    let params = PacingParams::new(10.0, 2.0);
    let t0 = Instant::now();
    let now = t0 + Duration::from_secs(11);
    let prev = Pacing { ttlast: Some(t0), cclast: 3.0, ddlast: 2.0 };

    let (delay, next) = pre_service(prev, now, &params);

    assert_eq!(delay, 0.0);
    assert_eq!(next.cclast, 0.0);
    assert_eq!(next.ddlast, 0.0);
    assert_eq!(next.ttlast, Some(now));
}

#[test]
fn smoothing_averages_previous_delay_with_raw() {
    let params = PacingParams::new(10.0, 2.0);
    let now = Instant::now();
    let prev = Pacing { ttlast: Some(now), cclast: 0.4, ddlast: 1.0 };

    // ttdiff 0 so nothing fades: raw = 1.6, smoothed = (1.0 + 1.6) / 2.
    let (delay, _) = pre_service(prev, now, &params);
    assert!(approx(delay, 1.3), "delay = {delay}");
}

#[test]
fn fading_is_monotone_in_elapsed_time() {
    let params = PacingParams::new(10.0, 2.0);
    let t0 = Instant::now();

    let mut last = f64::INFINITY;
    for ms in (0..10_000).step_by(500) {
        let now = t0 + Duration::from_millis(ms as u64 + 1);
        let prev = Pacing { ttlast: Some(t0), cclast: 1.0, ddlast: 0.0 };
        let (_, next) = pre_service(prev, now, &params);
        assert!(next.cclast < last, "cclast not decreasing at ttdiff {ms}ms");
        last = next.cclast;
    }
}

#[test]
fn accumulators_stay_non_negative() {
    let params = PacingParams::new(12.0, 4.0);
    let t0 = Instant::now();

    for cclast in [0.0, 0.001, 0.5, 11.9, 50.0] {
        for ddlast in [0.0, 0.25, 12.0] {
            for secs in [0, 1, 6, 11, 12, 40] {
                let now = t0 + Duration::from_secs(secs);
                let prev = Pacing { ttlast: Some(t0), cclast, ddlast };
                let (delay, next) = pre_service(prev, now, &params);
                assert!(delay >= 0.0);
                assert!(next.cclast >= 0.0);
                assert!(next.ddlast >= 0.0);

                let post = post_service(prev, now, 0.75, &params);
                assert!(post.cclast >= 0.0);
                assert!(post.ddlast >= 0.0);
            }
        }
    }
}

// ── post_service ──────────────────────────────────────────────────────

#[test]
fn post_service_accumulates_measured_cost() {
    let params = PacingParams::new(10.0, 2.0);
    let now = Instant::now();
    let prev = Pacing { ttlast: Some(now), cclast: 0.4, ddlast: 0.1 };

    let next = post_service(prev, now, 0.25, &params);

    assert!(approx(next.cclast, 0.65));
    assert!(approx(next.ddlast, 0.1));
    assert_eq!(next.ttlast, Some(now));
}

#[test]
fn post_service_fades_before_accumulating() {
    let params = PacingParams::new(10.0, 2.0);
    let t0 = Instant::now();
    let now = t0 + Duration::from_secs(5);
    let prev = Pacing { ttlast: Some(t0), cclast: 1.0, ddlast: 0.5 };

    let next = post_service(prev, now, 0.2, &params);

    // fading = 0.5
    assert!(approx(next.cclast, 0.7));
    assert!(approx(next.ddlast, 0.25));
}

#[test]
fn post_service_after_full_window_records_only_new_cost() {
    // Two requests a full window apart: the second's post-service state
    // carries exactly its own measured cost.
    let params = PacingParams::new(10.0, 2.0);
    let t0 = Instant::now();
    let now = t0 + Duration::from_secs(12);
    let prev = Pacing { ttlast: Some(t0), cclast: 4.0, ddlast: 3.0 };

    let next = post_service(prev, now, 0.05, &params);

    assert!(approx(next.cclast, 0.05));
    assert_eq!(next.ddlast, 0.0);
}

#[test]
fn fresh_state_post_service_records_cost_verbatim() {
    let params = PacingParams::new(12.0, 4.0);
    let now = Instant::now();

    let next = post_service(Pacing::default(), now, 0.05, &params);

    assert!(approx(next.cclast, 0.05));
    assert_eq!(next.ttlast, Some(now));
}
