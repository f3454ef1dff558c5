//! mDNS/Bonjour hub lookup

use crate::{DiscoveryError, HubLookup, Result};
use mdns_sd::{Receiver, ServiceDaemon, ServiceEvent, ServiceInfo};
use std::net::IpAddr;
use tally_core::{HubAddress, DEFAULT_UDP_PORT, MDNS_SERVICE_TYPE};
use tracing::{debug, info, warn};

/// Browse for the hub's advertised service
///
/// The daemon is created on the first `start` and kept for later lookups.
pub struct MdnsLookup {
    service_type: String,
    daemon: Option<ServiceDaemon>,
    browse: Option<Receiver<ServiceEvent>>,
}

impl MdnsLookup {
    pub fn new() -> Self {
        Self::with_service_type(MDNS_SERVICE_TYPE)
    }

    pub fn with_service_type(service_type: &str) -> Self {
        Self {
            service_type: service_type.to_string(),
            daemon: None,
            browse: None,
        }
    }

    fn daemon(&mut self) -> Result<&ServiceDaemon> {
        if self.daemon.is_none() {
            let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::Mdns(e.to_string()))?;
            self.daemon = Some(daemon);
        }
        self.daemon
            .as_ref()
            .ok_or_else(|| DiscoveryError::Mdns("daemon unavailable".to_string()))
    }
}

impl Default for MdnsLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl HubLookup for MdnsLookup {
    fn start(&mut self) -> Result<()> {
        self.stop();
        let service_type = self.service_type.clone();
        let receiver = self
            .daemon()?
            .browse(&service_type)
            .map_err(|e| DiscoveryError::Mdns(e.to_string()))?;

        info!("Starting mDNS lookup for {}", service_type);
        self.browse = Some(receiver);
        Ok(())
    }

    fn poll(&mut self) -> Option<HubAddress> {
        let receiver = self.browse.as_ref()?;

        let mut found = None;
        while let Ok(event) = receiver.try_recv() {
            match event {
                ServiceEvent::ServiceResolved(info) => {
                    debug!("mDNS resolved: {}", info.get_fullname());
                    if let Some(hub) = hub_from_service(&info) {
                        info!("Hub found via mDNS at {}", hub);
                        found = Some(hub);
                        break;
                    }
                }
                ServiceEvent::SearchStopped(_) => {
                    debug!("mDNS search stopped");
                    break;
                }
                other => debug!("mDNS event: {:?}", other),
            }
        }

        if found.is_some() {
            self.stop();
        }
        found
    }

    fn stop(&mut self) {
        if self.browse.take().is_some() {
            if let Some(daemon) = &self.daemon {
                if let Err(e) = daemon.stop_browse(&self.service_type) {
                    warn!("mDNS stop_browse failed: {}", e);
                }
            }
        }
    }
}

impl Drop for MdnsLookup {
    fn drop(&mut self) {
        self.stop();
        if let Some(daemon) = self.daemon.take() {
            let _ = daemon.shutdown();
        }
    }
}

/// Address and port from a resolved record
///
/// IPv4 is preferred. The port comes from the `udp` TXT entry when present.
fn hub_from_service(info: &ServiceInfo) -> Option<HubAddress> {
    let addresses: Vec<IpAddr> = info.get_addresses().iter().map(|addr| (*addr).into()).collect();
    let ip = addresses
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addresses.first())
        .copied()?;

    let port = info
        .get_properties()
        .get("udp")
        .and_then(|v| v.val())
        .and_then(|val| String::from_utf8_lossy(val).trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .unwrap_or_else(|| match info.get_port() {
            0 => DEFAULT_UDP_PORT,
            port => port,
        });

    Some(HubAddress::new(ip, port))
}
