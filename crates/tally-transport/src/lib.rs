//! Tally Transport Layer
//!
//! One UDP endpoint per node:
//! - [`DatagramSocket`]: the non-blocking send / receive-one / restart seam
//! - [`UdpTransport`]: non-blocking std socket configured through socket2
//! - [`ManagedSocket`]: restart-on-failure and periodic hygiene restarts

pub mod error;
pub mod managed;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use managed::{ManagedSocket, RestartReason, DEFAULT_HYGIENE_INTERVAL};
pub use traits::{Datagram, DatagramSocket};
pub use udp::{UdpConfig, UdpTransport};
