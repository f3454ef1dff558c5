//! Registration Engine Tests (tally-client)
//!
//! Tests for the registration and heartbeat state machine including:
//! - Minimum interval guard between attempts
//! - Hub timeout and the LOST hold
//! - Slow-retry regime after the fast-retry ceiling
//! - Guard bypass for register_required and hub changes
//! - Link loss

use std::time::{Duration, Instant};
use tally_client::{ConnectionState, RegistrationEngine, Request, Timing};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn engine_on_link(t0: Instant) -> RegistrationEngine {
    let mut engine = RegistrationEngine::new(Timing::default());
    engine.link_up();
    assert_eq!(engine.poll(t0), Some(Request::Register));
    engine
}

fn registered(t0: Instant) -> RegistrationEngine {
    let mut engine = engine_on_link(t0);
    engine.registered(t0);
    assert_eq!(engine.state(), ConnectionState::Registered);
    engine
}

// ============================================================================
// Attempt spacing
// ============================================================================

#[test]
fn test_attempts_respect_minimum_interval() {
    let t0 = Instant::now();
    let mut engine = engine_on_link(t0);

    assert_eq!(engine.poll(t0 + secs(1)), None);
    assert_eq!(engine.poll(t0 + secs(14)), None);
    assert_eq!(engine.poll(t0 + secs(15)), Some(Request::Register));
    assert_eq!(engine.counters().attempts, 2);
    assert_eq!(engine.state(), ConnectionState::Registering);
}

#[test]
fn test_slow_retry_after_ceiling() {
    let t0 = Instant::now();
    let mut engine = engine_on_link(t0);

    // Attempts 2..=5 at the normal spacing
    for n in 1..5u64 {
        assert_eq!(engine.poll(t0 + secs(15 * n)), Some(Request::Register));
    }
    assert_eq!(engine.counters().attempts, 5);
    assert!(engine.in_slow_retry());

    let fifth = t0 + secs(60);
    // The normal interval no longer applies
    assert_eq!(engine.poll(fifth + secs(15)), None);
    for s in (20..300).step_by(10) {
        assert_eq!(engine.poll(fifth + secs(s)), None, "no attempt at +{}s", s);
    }

    assert_eq!(engine.poll(fifth + secs(300)), Some(Request::Register));
    assert_eq!(engine.counters().attempts, 1, "counter resets after the cooldown");

    // Fast cadence resumes
    assert_eq!(engine.poll(fifth + secs(315)), Some(Request::Register));
}

#[test]
fn test_engine_never_gives_up() {
    let t0 = Instant::now();
    let mut engine = engine_on_link(t0);
    let mut sent = 1;
    for s in 1..=3600u64 {
        if engine.poll(t0 + secs(s)).is_some() {
            sent += 1;
        }
    }
    assert!(sent > 10, "expected continued attempts, got {}", sent);
    assert_eq!(engine.state(), ConnectionState::Registering);
}

// ============================================================================
// Liveness
// ============================================================================

#[test]
fn test_any_traffic_resets_attempts() {
    let t0 = Instant::now();
    let mut engine = engine_on_link(t0);
    engine.poll(t0 + secs(15));
    assert_eq!(engine.counters().attempts, 2);

    engine.hub_traffic(t0 + secs(16));
    assert_eq!(engine.counters().attempts, 0);
    assert_eq!(engine.last_response(), Some(t0 + secs(16)));
}

#[test]
fn test_timeout_moves_to_lost_exactly_once() {
    let t0 = Instant::now();
    let mut engine = registered(t0);
    let mut entered_lost = 0;
    let mut previous = engine.state();

    let mut now = t0;
    while now < t0 + secs(62) {
        now += Duration::from_millis(250);
        engine.poll(now);
        if engine.state() == ConnectionState::Lost && previous != ConnectionState::Lost {
            entered_lost += 1;
        }
        previous = engine.state();
    }

    assert_eq!(entered_lost, 1);
    assert_eq!(engine.state(), ConnectionState::Lost);
}

#[test]
fn test_timeout_boundary() {
    let t0 = Instant::now();
    let mut engine = registered(t0);

    engine.poll(t0 + secs(60));
    assert_eq!(engine.state(), ConnectionState::Registered);

    engine.poll(t0 + secs(61));
    assert_eq!(engine.state(), ConnectionState::Lost);
}

#[test]
fn test_lost_hold_before_reconnect() {
    let t0 = Instant::now();
    let mut engine = registered(t0);
    let lost_at = t0 + secs(61);
    engine.poll(lost_at);
    assert_eq!(engine.state(), ConnectionState::Lost);

    assert_eq!(engine.poll(lost_at + Duration::from_millis(1900)), None);
    assert_eq!(engine.state(), ConnectionState::Lost);

    assert_eq!(engine.poll(lost_at + secs(2)), Some(Request::Register));
    assert_eq!(engine.state(), ConnectionState::Registering);
}

#[test]
fn test_heartbeat_keeps_registered_with_acks() {
    let t0 = Instant::now();
    let mut engine = registered(t0);

    for n in 1..=10u64 {
        let at = t0 + secs(30 * n);
        assert_eq!(engine.poll(at), Some(Request::Heartbeat));
        engine.hub_traffic(at + Duration::from_millis(50));
    }
    assert_eq!(engine.state(), ConnectionState::Registered);
}

// ============================================================================
// Guard bypass
// ============================================================================

#[test]
fn test_register_required_bypasses_guard() {
    let t0 = Instant::now();
    let mut engine = registered(t0);

    engine.hub_traffic(t0 + secs(1));
    engine.registration_required();
    assert_eq!(engine.poll(t0 + secs(1)), Some(Request::Register));
    assert_eq!(engine.state(), ConnectionState::Registering);

    // Back under the guard afterwards
    assert_eq!(engine.poll(t0 + secs(2)), None);
}

#[test]
fn test_hub_change_bypasses_slow_retry() {
    let t0 = Instant::now();
    let mut engine = engine_on_link(t0);
    for n in 1..5u64 {
        engine.poll(t0 + secs(15 * n));
    }
    assert!(engine.in_slow_retry());

    engine.hub_changed();
    assert_eq!(engine.counters().attempts, 0);
    assert_eq!(engine.poll(t0 + secs(61)), Some(Request::Register));
}

// ============================================================================
// Link
// ============================================================================

#[test]
fn test_link_lost_clears_counters() {
    let t0 = Instant::now();
    let mut engine = registered(t0);
    engine.link_lost();

    assert_eq!(engine.state(), ConnectionState::Disconnected);
    assert_eq!(engine.counters().attempts, 0);
    assert_eq!(engine.last_response(), None);
    assert_eq!(engine.poll(t0 + secs(100)), None);

    engine.link_up();
    assert_eq!(engine.state(), ConnectionState::WifiUp);
    assert_eq!(engine.poll(t0 + secs(100)), Some(Request::Register));
}

#[test]
fn test_hub_forgotten_waits_for_discovery() {
    let t0 = Instant::now();
    let mut engine = registered(t0);
    engine.hub_forgotten();
    assert_eq!(engine.state(), ConnectionState::WifiUp);
}
