//! UDP broadcast probe targeting

use std::net::{Ipv4Addr, SocketAddr};
use tally_core::HubAddress;

/// Destinations for one discovery probe
///
/// The subnet broadcast address always comes first; a stale hub address is
/// probed directly as well, since a hub that moved ports still answers there.
pub fn probe_targets(broadcast: Ipv4Addr, port: u16, stale: Option<HubAddress>) -> Vec<SocketAddr> {
    let mut targets = vec![SocketAddr::from((broadcast, port))];
    if let Some(stale) = stale {
        let addr = stale.socket_addr();
        if !targets.contains(&addr) {
            targets.push(addr);
        }
    }
    targets
}

/// Directed broadcast address for an IPv4 interface
pub fn subnet_broadcast(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_targets_without_stale() {
        let targets = probe_targets(Ipv4Addr::BROADCAST, 7411, None);
        assert_eq!(targets, vec!["255.255.255.255:7411".parse().unwrap()]);
    }

    #[test]
    fn test_probe_targets_with_stale() {
        let stale: HubAddress = "10.0.0.5:7411".parse().unwrap();
        let targets = probe_targets(Ipv4Addr::BROADCAST, 7411, Some(stale));
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1], stale.socket_addr());
    }

    #[test]
    fn test_subnet_broadcast() {
        let b = subnet_broadcast(Ipv4Addr::new(192, 168, 1, 42), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(b, Ipv4Addr::new(192, 168, 1, 255));
    }
}
