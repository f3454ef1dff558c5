//! Transport trait definitions

use bytes::Bytes;
use std::net::SocketAddr;

use crate::error::Result;

/// A datagram received from the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub data: Bytes,
    pub from: SocketAddr,
}

/// A single UDP endpoint driven from one execution context
///
/// None of the methods block. Implementations hold at most the OS receive
/// buffer; nothing is queued on top of it.
pub trait DatagramSocket {
    /// Send one datagram
    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()>;

    /// Take the next datagram if one is ready
    fn poll_recv(&mut self) -> Result<Option<Datagram>>;

    /// Close and reopen the endpoint on its configured port
    fn restart(&mut self) -> Result<()>;

    /// Local address, if bound
    fn local_addr(&self) -> Option<SocketAddr>;
}
