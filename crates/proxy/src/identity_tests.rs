// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::http::{HeaderMap, HeaderValue};

fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_static(value));
    }
    map
}

fn peer(addr: &str) -> Option<SocketAddr> {
    addr.parse().ok()
}

#[test]
fn cf_connecting_ip_wins() {
    let map = headers(&[("cf-connecting-ip", "203.0.113.9"), ("x-forwarded-for", "10.0.0.1")]);
    assert_eq!(client_key(&map, peer("192.168.1.5:443")), "203.0.113.9");
}

#[test]
fn forwarded_for_takes_first_hop() {
    let map = headers(&[("x-forwarded-for", " 10.0.0.1 , 10.0.0.2, 10.0.0.3")]);
    assert_eq!(client_key(&map, peer("192.168.1.5:443")), "10.0.0.1");
}

#[test]
fn empty_cf_header_falls_through_to_forwarded_for() {
    let map = headers(&[("cf-connecting-ip", "  "), ("x-forwarded-for", "10.0.0.7")]);
    assert_eq!(client_key(&map, None), "10.0.0.7");
}

#[test]
fn empty_forwarded_first_hop_falls_through_to_peer() {
    let map = headers(&[("x-forwarded-for", " , 10.0.0.2")]);
    assert_eq!(client_key(&map, peer("192.168.1.5:443")), "192.168.1.5");
}

#[test]
fn peer_address_is_host_only() {
    assert_eq!(client_key(&HeaderMap::new(), peer("172.16.0.8:51234")), "172.16.0.8");
}

#[test]
fn ipv6_peer_address() {
    assert_eq!(client_key(&HeaderMap::new(), peer("[::1]:8080")), "::1");
}

#[test]
fn no_identity_sources_yields_placeholder() {
    assert_eq!(client_key(&HeaderMap::new(), None), "unknown");
}
