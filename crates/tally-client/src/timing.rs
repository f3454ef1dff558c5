//! Timing constants

use std::time::Duration;

/// Every interval the client core runs on
///
/// The defaults match the deployed node firmware; any field may be tuned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Liveness ping cadence while registered
    pub heartbeat_interval: Duration,
    /// Silence after which the hub is considered lost
    pub hub_timeout: Duration,
    /// How long LOST stays visible before the first reconnection attempt
    pub hub_lost_hold: Duration,
    /// Minimum spacing between registration attempts
    pub min_reconnect_interval: Duration,
    /// Failed attempts before the slow-retry regime
    pub fast_retry_ceiling: u32,
    /// Spacing of attempts in the slow-retry regime
    pub slow_retry_cooldown: Duration,
    /// Physical link poll cadence
    pub wifi_poll_interval: Duration,
    /// Spacing of full link reconnections while the link is down
    pub wifi_reconnect_interval: Duration,
    /// Failed link reconnections before configuration mode
    pub wifi_reconnect_ceiling: u32,
    /// Periodic socket recycle
    pub udp_hygiene_interval: Duration,
    /// Admin notice lifetime when the hub gives none
    pub admin_default_duration: Duration,
    /// Datagrams handled per tick
    pub max_datagrams_per_tick: usize,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            hub_timeout: Duration::from_secs(60),
            hub_lost_hold: Duration::from_secs(2),
            min_reconnect_interval: Duration::from_secs(15),
            fast_retry_ceiling: 5,
            slow_retry_cooldown: Duration::from_secs(5 * 60),
            wifi_poll_interval: Duration::from_secs(2),
            wifi_reconnect_interval: Duration::from_secs(30),
            wifi_reconnect_ceiling: 10,
            udp_hygiene_interval: Duration::from_secs(10 * 60),
            admin_default_duration: Duration::from_secs(10),
            max_datagrams_per_tick: 16,
        }
    }
}
