//! WiFi link monitor
//!
//! A cheap poll of the physical link, layered under the hub timeout so that
//! link loss shows up within one poll interval. While the link stays down the
//! monitor escalates to full reconnections, and after too many failures asks
//! for configuration mode.

use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::timing::Timing;

/// Physical network link
pub trait WifiLink {
    /// Current association state
    fn is_connected(&mut self) -> bool;

    /// Full reconnection using every remembered network; true on success
    fn reconnect(&mut self) -> bool;
}

impl<L: WifiLink + ?Sized> WifiLink for Box<L> {
    fn is_connected(&mut self) -> bool {
        (**self).is_connected()
    }

    fn reconnect(&mut self) -> bool {
        (**self).reconnect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down,
    /// Reconnection ceiling reached; operator action required
    ConfigModeRequired,
}

#[derive(Debug, Clone)]
pub struct LinkMonitor {
    poll_interval: Duration,
    reconnect_interval: Duration,
    reconnect_ceiling: u32,
    last_poll: Option<Instant>,
    up: bool,
    down_since: Option<Instant>,
    last_reconnect: Option<Instant>,
    failures: u32,
    config_mode: bool,
}

impl LinkMonitor {
    pub fn new(timing: &Timing) -> Self {
        Self {
            poll_interval: timing.wifi_poll_interval,
            reconnect_interval: timing.wifi_reconnect_interval,
            reconnect_ceiling: timing.wifi_reconnect_ceiling,
            last_poll: None,
            up: false,
            down_since: None,
            last_reconnect: None,
            failures: 0,
            config_mode: false,
        }
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn in_config_mode(&self) -> bool {
        self.config_mode
    }

    /// Consecutive failed reconnections
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Operator entered configuration mode; stop escalating
    pub fn enter_config_mode(&mut self) {
        if !self.config_mode {
            info!("Configuration mode entered");
        }
        self.config_mode = true;
    }

    /// Operator left configuration mode; escalation starts over
    pub fn clear_config_mode(&mut self) {
        if self.config_mode {
            info!("Configuration mode cleared");
        }
        self.config_mode = false;
        self.failures = 0;
        self.last_reconnect = None;
        self.last_poll = None;
    }

    /// Check the link if the poll interval has elapsed
    pub fn poll<W: WifiLink + ?Sized>(&mut self, link: &mut W, now: Instant) -> Option<LinkEvent> {
        if let Some(at) = self.last_poll {
            if now.saturating_duration_since(at) < self.poll_interval {
                return None;
            }
        }
        self.last_poll = Some(now);

        if link.is_connected() {
            return self.mark_up();
        }

        let was_up = self.up;
        self.up = false;
        let since = *self.down_since.get_or_insert(now);
        if was_up {
            warn!("WiFi link lost");
            self.last_reconnect = None;
            return Some(LinkEvent::Down);
        }

        if self.config_mode {
            return None;
        }

        let last = self.last_reconnect.unwrap_or(since);
        if now.saturating_duration_since(last) < self.reconnect_interval {
            return None;
        }
        self.last_reconnect = Some(now);

        if link.reconnect() {
            return self.mark_up();
        }

        self.failures += 1;
        warn!(
            "WiFi reconnection failed ({}/{})",
            self.failures, self.reconnect_ceiling
        );
        if self.failures >= self.reconnect_ceiling {
            error!("WiFi unreachable after {} reconnections, configuration required", self.failures);
            self.config_mode = true;
            return Some(LinkEvent::ConfigModeRequired);
        }
        None
    }

    fn mark_up(&mut self) -> Option<LinkEvent> {
        self.failures = 0;
        self.down_since = None;
        self.last_reconnect = None;
        if self.up {
            return None;
        }
        info!("WiFi link up");
        self.up = true;
        Some(LinkEvent::Up)
    }
}
