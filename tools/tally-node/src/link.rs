//! Host network link
//!
//! A desktop host cannot re-associate WiFi itself, so the link is judged by
//! whether the OS has a route to the probe address from a real interface.
//! Connecting a UDP socket only consults the routing table; nothing is sent.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use tally_client::WifiLink;
use tally_discovery::subnet_broadcast;
use tracing::debug;

pub struct HostLink {
    probe: SocketAddr,
}

impl HostLink {
    pub fn new(probe: SocketAddr) -> Self {
        Self { probe }
    }

    /// Local address the OS would use to reach the probe, if it is a real one
    pub fn local_ip(&self) -> Option<IpAddr> {
        let any: SocketAddr = if self.probe.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = match UdpSocket::bind(any) {
            Ok(socket) => socket,
            Err(e) => {
                debug!("Link probe bind failed: {}", e);
                return None;
            }
        };
        if let Err(e) = socket.connect(self.probe) {
            debug!("No route to {}: {}", self.probe, e);
            return None;
        }
        socket
            .local_addr()
            .ok()
            .map(|local| local.ip())
            .filter(|ip| !ip.is_loopback() && !ip.is_unspecified())
    }

    /// Directed broadcast for the routed interface
    ///
    /// Falls back to the limited broadcast address without a netmask or
    /// without a routed IPv4 interface.
    pub fn broadcast_addr(&self, netmask: Option<Ipv4Addr>) -> Ipv4Addr {
        match (self.local_ip(), netmask) {
            (Some(IpAddr::V4(ip)), Some(mask)) => subnet_broadcast(ip, mask),
            _ => Ipv4Addr::BROADCAST,
        }
    }

    fn routable(&self) -> bool {
        self.local_ip().is_some()
    }
}

impl WifiLink for HostLink {
    fn is_connected(&mut self) -> bool {
        self.routable()
    }

    fn reconnect(&mut self) -> bool {
        debug!("Re-probing host network");
        self.routable()
    }
}
