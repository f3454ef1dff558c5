//! Registration & heartbeat engine
//!
//! Owns [`ConnectionState`]. The engine never performs I/O: the client feeds
//! it events and calls [`RegistrationEngine::poll`] once per tick, sending
//! whatever [`Request`] comes back.
//!
//! ```text
//! DISCONNECTED --link up--> WIFI_UP --register sent--> REGISTERING
//! REGISTERING --"registered"--> REGISTERED --silence > hub_timeout--> LOST
//! LOST --hold elapsed, register sent--> REGISTERING
//! any --link down--> DISCONNECTED
//! ```

use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::timing::Timing;

/// Whether the node is on the network and known to the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    WifiUp,
    Registering,
    Registered,
    Lost,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::WifiUp => "WIFI_UP",
            ConnectionState::Registering => "REGISTERING",
            ConnectionState::Registered => "REGISTERED",
            ConnectionState::Lost => "LOST",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration attempt bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectCounters {
    /// Attempts since the last hub response
    pub attempts: u32,
    pub last_attempt: Option<Instant>,
    pub last_response: Option<Instant>,
}

/// Message the engine wants sent to the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Register,
    Heartbeat,
}

pub struct RegistrationEngine {
    timing: Timing,
    state: ConnectionState,
    counters: ReconnectCounters,
    last_heartbeat: Option<Instant>,
    lost_at: Option<Instant>,
    /// Next attempt skips the interval guard
    bypass_guard: bool,
    /// Re-announce while registered (e.g. new assignment)
    announce: bool,
}

impl RegistrationEngine {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            state: ConnectionState::Disconnected,
            counters: ReconnectCounters::default(),
            last_heartbeat: None,
            lost_at: None,
            bypass_guard: false,
            announce: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn counters(&self) -> ReconnectCounters {
        self.counters
    }

    pub fn last_response(&self) -> Option<Instant> {
        self.counters.last_response
    }

    pub fn is_registered(&self) -> bool {
        self.state == ConnectionState::Registered
    }

    /// True while attempts are spaced by the slow-retry cooldown
    pub fn in_slow_retry(&self) -> bool {
        self.counters.attempts >= self.timing.fast_retry_ceiling
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state != to {
            info!("Connection state {} -> {}", self.state, to);
            self.state = to;
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Physical link confirmed up
    pub fn link_up(&mut self) {
        if self.state == ConnectionState::Disconnected {
            self.transition(ConnectionState::WifiUp);
        }
    }

    /// Physical link lost
    pub fn link_lost(&mut self) {
        self.transition(ConnectionState::Disconnected);
        self.counters = ReconnectCounters::default();
        self.last_heartbeat = None;
        self.lost_at = None;
        self.bypass_guard = false;
        self.announce = false;
    }

    /// Any known message from the hub
    pub fn hub_traffic(&mut self, now: Instant) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.counters.last_response = Some(now);
        self.counters.attempts = 0;
    }

    /// Explicit registration acknowledgement
    pub fn registered(&mut self, now: Instant) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.hub_traffic(now);
        if self.state != ConnectionState::Registered {
            self.last_heartbeat = Some(now);
        }
        self.lost_at = None;
        self.announce = false;
        self.transition(ConnectionState::Registered);
    }

    /// Hub lost its record of this node; register now regardless of timers
    pub fn registration_required(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        debug!("Hub requested registration");
        self.bypass_guard = true;
        if self.state == ConnectionState::Registered {
            self.transition(ConnectionState::Registering);
        }
    }

    /// The hub address was resolved or changed
    pub fn hub_changed(&mut self) {
        self.counters.attempts = 0;
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.bypass_guard = true;
        if matches!(self.state, ConnectionState::Registered | ConnectionState::Lost) {
            self.transition(ConnectionState::Registering);
        }
    }

    /// The hub address was forgotten; wait for discovery
    pub fn hub_forgotten(&mut self) {
        if self.state != ConnectionState::Disconnected {
            self.transition(ConnectionState::WifiUp);
        }
        self.lost_at = None;
        self.announce = false;
    }

    /// Operator-requested reconnection
    pub fn force_reconnect(&mut self) {
        self.hub_changed();
    }

    /// Send a fresh registration so the hub sees new node details
    pub fn refresh_registration(&mut self) {
        match self.state {
            ConnectionState::Disconnected => {}
            ConnectionState::Registered => self.announce = true,
            _ => self.bypass_guard = true,
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Run timers; returns the message to send, if any
    pub fn poll(&mut self, now: Instant) -> Option<Request> {
        match self.state {
            ConnectionState::Disconnected => None,
            ConnectionState::Registered => self.poll_registered(now),
            ConnectionState::Lost => {
                let held = self
                    .lost_at
                    .map_or(true, |at| now.saturating_duration_since(at) >= self.timing.hub_lost_hold);
                if held || self.bypass_guard {
                    self.attempt(now)
                } else {
                    None
                }
            }
            ConnectionState::WifiUp | ConnectionState::Registering => self.attempt(now),
        }
    }

    fn poll_registered(&mut self, now: Instant) -> Option<Request> {
        let silent_for = self
            .counters
            .last_response
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        if silent_for > self.timing.hub_timeout {
            warn!("No hub traffic for {:?}, hub lost", silent_for);
            self.transition(ConnectionState::Lost);
            self.lost_at = Some(now);
            self.announce = false;
            return None;
        }

        if self.announce {
            self.announce = false;
            return Some(Request::Register);
        }

        let due = self
            .last_heartbeat
            .map_or(true, |at| now.saturating_duration_since(at) >= self.timing.heartbeat_interval);
        if due {
            self.last_heartbeat = Some(now);
            return Some(Request::Heartbeat);
        }
        None
    }

    fn attempt(&mut self, now: Instant) -> Option<Request> {
        let since_last = self
            .counters
            .last_attempt
            .map(|at| now.saturating_duration_since(at));
        let slow = self.in_slow_retry();

        if !self.bypass_guard {
            let spacing = if slow {
                self.timing.slow_retry_cooldown
            } else {
                self.timing.min_reconnect_interval
            };
            if since_last.map_or(false, |elapsed| elapsed < spacing) {
                return None;
            }
            if slow {
                info!("Slow-retry cooldown elapsed, resuming fast retries");
                self.counters.attempts = 0;
            }
        }

        self.bypass_guard = false;
        self.counters.attempts += 1;
        self.counters.last_attempt = Some(now);
        self.lost_at = None;
        self.transition(ConnectionState::Registering);

        if self.in_slow_retry() {
            warn!(
                "{} registration attempts unanswered, next attempt in {:?}",
                self.counters.attempts, self.timing.slow_retry_cooldown
            );
        } else {
            debug!("Registration attempt {}", self.counters.attempts);
        }
        Some(Request::Register)
    }
}
