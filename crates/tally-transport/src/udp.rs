//! UDP transport implementation

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use tally_core::{DEFAULT_UDP_PORT, MAX_DATAGRAM_SIZE};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{Datagram, DatagramSocket};

/// UDP configuration
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Local address to bind
    pub bind_addr: SocketAddr,
    /// Receive buffer size; longer datagrams are truncated by the OS
    pub recv_buffer_size: usize,
    /// Allow sending to broadcast addresses
    pub broadcast: bool,
    /// Set SO_REUSEADDR so a restart can rebind the same port immediately
    pub reuse_address: bool,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_UDP_PORT)),
            recv_buffer_size: MAX_DATAGRAM_SIZE,
            broadcast: true,
            reuse_address: true,
        }
    }
}

impl UdpConfig {
    /// Default configuration bound to a specific local address
    pub fn bound_to(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }
}

/// Non-blocking UDP endpoint
///
/// The socket is put in non-blocking mode at bind time so the caller's tick
/// never waits on the network; an empty receive queue reads as `None`.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    config: UdpConfig,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Bind with the default configuration
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_config(UdpConfig::bound_to(addr))
    }

    /// Bind with config
    pub fn bind_with_config(config: UdpConfig) -> Result<Self> {
        let socket = open(&config)?;
        info!("UDP bound to {}", display_addr(&socket));

        Ok(Self {
            buf: vec![0u8; config.recv_buffer_size],
            socket: Some(socket),
            config,
        })
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    pub fn is_bound(&self) -> bool {
        self.socket.is_some()
    }
}

impl DatagramSocket for UdpTransport {
    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotBound)?;
        match socket.send_to(data, target) {
            Ok(_) => {
                debug!("UDP sent {} bytes to {}", data.len(), target);
                Ok(())
            }
            Err(e) => Err(TransportError::SendFailed(format!("{}: {}", target, e))),
        }
    }

    fn poll_recv(&mut self) -> Result<Option<Datagram>> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotBound)?;
        match socket.recv_from(&mut self.buf) {
            Ok((len, from)) => {
                debug!("UDP received {} bytes from {}", len, from);
                Ok(Some(Datagram {
                    data: Bytes::copy_from_slice(&self.buf[..len]),
                    from,
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }

    fn restart(&mut self) -> Result<()> {
        // An ephemeral bind keeps the port it was first given
        let mut config = self.config.clone();
        if config.bind_addr.port() == 0 {
            if let Some(previous) = self.local_addr() {
                config.bind_addr.set_port(previous.port());
                self.config.bind_addr = config.bind_addr;
            }
        }

        // Release the port before rebinding it
        self.socket = None;
        match open(&config) {
            Ok(socket) => {
                info!("UDP rebound to {}", display_addr(&socket));
                self.socket = Some(socket);
                Ok(())
            }
            Err(e) => {
                warn!("UDP rebind on {} failed: {}", self.config.bind_addr, e);
                Err(e)
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

fn open(config: &UdpConfig) -> Result<UdpSocket> {
    let bind_failed = |e: io::Error| TransportError::BindFailed(format!("{}: {}", config.bind_addr, e));

    let socket = Socket::new(
        Domain::for_address(config.bind_addr),
        Type::DGRAM,
        Some(Protocol::UDP),
    )
    .map_err(bind_failed)?;

    if config.reuse_address {
        socket.set_reuse_address(true).map_err(bind_failed)?;
    }
    if config.broadcast {
        socket.set_broadcast(true).map_err(bind_failed)?;
    }
    socket.set_nonblocking(true).map_err(bind_failed)?;
    socket.bind(&config.bind_addr.into()).map_err(bind_failed)?;

    Ok(socket.into())
}

fn display_addr(socket: &UdpSocket) -> String {
    socket
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string())
}
