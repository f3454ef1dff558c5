//! Tally Discovery
//!
//! Finds the hub while its address is unknown:
//! - UDP broadcast probes at a bounded cadence
//! - a single mDNS lookup once the probes are exhausted
//! - a rest period, then the cycle re-arms
//!
//! [`Discovery`] does no I/O of its own besides driving the [`HubLookup`]; the
//! caller sends the probe datagrams it asks for.

pub mod broadcast;
pub mod error;
pub mod lookup;

#[cfg(feature = "mdns")]
pub mod mdns;

pub use broadcast::{probe_targets, subnet_broadcast};
pub use error::{DiscoveryError, Result};
pub use lookup::{HubLookup, NoLookup};

#[cfg(feature = "mdns")]
pub use mdns::MdnsLookup;

use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tally_core::{HubAddress, DEFAULT_UDP_PORT};
use tracing::{debug, info, warn};

/// Where a hub address came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    /// Reply to a broadcast probe
    Broadcast,
    /// mDNS service lookup
    Mdns,
    /// Operator or configuration file
    Manual,
    /// Loaded from persisted settings
    Persisted,
}

/// Discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Time between broadcast probes
    pub probe_interval: Duration,
    /// Probes sent before falling back to the service lookup
    pub probe_ceiling: u32,
    /// How long the service lookup may run
    pub lookup_timeout: Duration,
    /// Rest after a failed lookup before probing again
    pub rearm_after: Duration,
    /// Broadcast destination
    pub broadcast_addr: Ipv4Addr,
    /// Hub port probes are sent to
    pub hub_port: u16,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(4),
            probe_ceiling: 6,
            lookup_timeout: Duration::from_secs(5),
            rearm_after: Duration::from_secs(5 * 60),
            broadcast_addr: Ipv4Addr::BROADCAST,
            hub_port: DEFAULT_UDP_PORT,
        }
    }
}

/// Current discovery phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    /// Sending broadcast probes
    Probing { attempts: u32 },
    /// Waiting on the service lookup
    Lookup { started: Instant },
    /// Everything failed; waiting to re-arm
    Resting { since: Instant },
    /// A hub address is known
    Resolved,
}

/// What the caller should do this tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryAction {
    /// Send a discover datagram to each target
    Probe(Vec<SocketAddr>),
    /// The service lookup found the hub
    Resolved(HubAddress),
}

/// Hub discovery state machine
pub struct Discovery {
    config: DiscoveryConfig,
    lookup: Box<dyn HubLookup>,
    phase: DiscoveryPhase,
    last_probe: Option<Instant>,
    stale: Option<HubAddress>,
    lookups: u32,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig, lookup: Box<dyn HubLookup>) -> Self {
        Self {
            config,
            lookup,
            phase: DiscoveryPhase::Probing { attempts: 0 },
            last_probe: None,
            stale: None,
            lookups: 0,
        }
    }

    /// Discovery without a service lookup
    pub fn broadcast_only(config: DiscoveryConfig) -> Self {
        Self::new(config, Box::new(NoLookup))
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn phase(&self) -> DiscoveryPhase {
        self.phase
    }

    /// Service lookups started since creation
    pub fn lookups_started(&self) -> u32 {
        self.lookups
    }

    pub fn stale_hub(&self) -> Option<HubAddress> {
        self.stale
    }

    /// Remember an address that may still answer direct probes
    pub fn set_stale_hub(&mut self, hub: Option<HubAddress>) {
        self.stale = hub;
    }

    /// Reset the probe counter for a fresh network session
    pub fn rearm(&mut self) {
        if matches!(self.phase, DiscoveryPhase::Lookup { .. }) {
            self.lookup.stop();
        }
        debug!("Discovery re-armed");
        self.phase = DiscoveryPhase::Probing { attempts: 0 };
        self.last_probe = None;
    }

    /// The hub address became known by any route
    pub fn resolved(&mut self) {
        if matches!(self.phase, DiscoveryPhase::Lookup { .. }) {
            self.lookup.stop();
        }
        self.phase = DiscoveryPhase::Resolved;
    }

    /// Advance the state machine
    ///
    /// Call once per tick while the hub address is unknown.
    pub fn poll(&mut self, now: Instant) -> Option<DiscoveryAction> {
        match self.phase {
            DiscoveryPhase::Resolved => None,
            DiscoveryPhase::Probing { attempts } => {
                let due = self
                    .last_probe
                    .map_or(true, |at| now.saturating_duration_since(at) >= self.config.probe_interval);
                if !due {
                    return None;
                }

                if attempts < self.config.probe_ceiling {
                    self.phase = DiscoveryPhase::Probing {
                        attempts: attempts + 1,
                    };
                    self.last_probe = Some(now);
                    debug!("Discovery probe {}/{}", attempts + 1, self.config.probe_ceiling);
                    return Some(DiscoveryAction::Probe(probe_targets(
                        self.config.broadcast_addr,
                        self.config.hub_port,
                        self.stale,
                    )));
                }

                self.start_lookup(now);
                None
            }
            DiscoveryPhase::Lookup { started } => {
                if let Some(hub) = self.lookup.poll() {
                    self.phase = DiscoveryPhase::Resolved;
                    return Some(DiscoveryAction::Resolved(hub));
                }
                if now.saturating_duration_since(started) >= self.config.lookup_timeout {
                    warn!("Service lookup found no hub");
                    self.lookup.stop();
                    self.phase = DiscoveryPhase::Resting { since: now };
                }
                None
            }
            DiscoveryPhase::Resting { since } => {
                if now.saturating_duration_since(since) >= self.config.rearm_after {
                    info!("Retrying hub discovery");
                    self.rearm();
                    return self.poll(now);
                }
                None
            }
        }
    }

    fn start_lookup(&mut self, now: Instant) {
        self.lookups += 1;
        match self.lookup.start() {
            Ok(()) => {
                info!("No discovery reply after {} probes, starting service lookup", self.config.probe_ceiling);
                self.phase = DiscoveryPhase::Lookup { started: now };
            }
            Err(e) => {
                warn!("Service lookup unavailable: {}", e);
                self.phase = DiscoveryPhase::Resting { since: now };
            }
        }
    }
}
