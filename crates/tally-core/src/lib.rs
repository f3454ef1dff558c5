//! Tally Core
//!
//! Wire protocol and data model shared by every tally-node crate.
//!
//! This crate provides:
//! - The hub message catalog ([`Inbound`], [`Outbound`])
//! - JSON datagram encoding/decoding ([`codec`])
//! - Device-side data model ([`DeviceIdentity`], [`HubAddress`],
//!   [`Assignment`], [`TallyState`])

pub mod codec;
pub mod error;
pub mod message;
pub mod types;

pub use codec::{decode, encode};
pub use error::{Error, Result};
pub use message::*;
pub use types::*;

/// Default UDP port used by the hub and by nodes
pub const DEFAULT_UDP_PORT: u16 = 7411;

/// mDNS service type advertised by the hub
pub const MDNS_SERVICE_TYPE: &str = "_tallyhub._udp.local.";

/// Largest datagram a node reads; the hub never sends more
pub const MAX_DATAGRAM_SIZE: usize = 512;

/// Prefix of every device id
pub const DEVICE_ID_PREFIX: &str = "tally-";

/// Device type reported in registrations
pub const DEVICE_TYPE: &str = "tally-node";
