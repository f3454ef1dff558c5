//! Restart and hygiene policy around a datagram socket
//!
//! A failed send closes and reopens the socket. Independently of failures,
//! the socket is recycled once per hygiene interval. A reopen that fails
//! leaves the transport down; sends then fail fast and the reopen is retried
//! on every [`ManagedSocket::maintain`] call.

use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{Datagram, DatagramSocket};

/// Default hygiene restart interval
pub const DEFAULT_HYGIENE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Why the socket was last reopened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    SendFailure,
    Hygiene,
    Recovery,
    Requested,
}

pub struct ManagedSocket<S> {
    inner: S,
    hygiene_interval: Duration,
    opened_at: Instant,
    up: bool,
    restarts: u64,
    last_restart: Option<RestartReason>,
}

impl<S: DatagramSocket> ManagedSocket<S> {
    /// Wrap a socket that was opened at `now`
    pub fn new(inner: S, hygiene_interval: Duration, now: Instant) -> Self {
        Self {
            inner,
            hygiene_interval,
            opened_at: now,
            up: true,
            restarts: 0,
            last_restart: None,
        }
    }

    /// Send one datagram, restarting the socket if the send fails
    ///
    /// The error is still returned so the caller can log it; nothing needs to
    /// be retried beyond the caller's normal schedule.
    pub fn send(&mut self, data: &[u8], target: SocketAddr, now: Instant) -> Result<()> {
        if !self.up {
            return Err(TransportError::NotBound);
        }

        match self.inner.send_to(data, target) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Send to {} failed, restarting socket: {}", target, e);
                self.restart(RestartReason::SendFailure, now);
                Err(e)
            }
        }
    }

    /// Take at most one datagram
    ///
    /// Receive errors are logged and reported as "nothing ready".
    pub fn poll_recv(&mut self) -> Option<Datagram> {
        if !self.up {
            return None;
        }

        match self.inner.poll_recv() {
            Ok(datagram) => datagram,
            Err(e) => {
                debug!("Receive error ignored: {}", e);
                None
            }
        }
    }

    /// Run the hygiene timer and retry a failed reopen
    pub fn maintain(&mut self, now: Instant) {
        if !self.up {
            self.restart(RestartReason::Recovery, now);
        } else if now.saturating_duration_since(self.opened_at) >= self.hygiene_interval {
            self.restart(RestartReason::Hygiene, now);
        }
    }

    /// Close and reopen the socket
    pub fn restart(&mut self, reason: RestartReason, now: Instant) -> bool {
        self.last_restart = Some(reason);
        match self.inner.restart() {
            Ok(()) => {
                if !self.up || reason != RestartReason::Hygiene {
                    info!("Socket restarted ({:?})", reason);
                } else {
                    debug!("Socket recycled");
                }
                self.up = true;
                self.opened_at = now;
                self.restarts += 1;
                true
            }
            Err(e) => {
                if self.up {
                    error!("Socket reopen failed ({:?}): {}", reason, e);
                }
                self.up = false;
                false
            }
        }
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Successful reopens since creation
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn last_restart(&self) -> Option<RestartReason> {
        self.last_restart
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeSocket {
        fail_sends: usize,
        fail_restarts: usize,
        sent: Vec<(Vec<u8>, SocketAddr)>,
        inbound: VecDeque<Datagram>,
        restarts: usize,
    }

    impl DatagramSocket for FakeSocket {
        fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()> {
            if self.fail_sends > 0 {
                self.fail_sends -= 1;
                return Err(TransportError::SendFailed("unreachable".into()));
            }
            self.sent.push((data.to_vec(), target));
            Ok(())
        }

        fn poll_recv(&mut self) -> Result<Option<Datagram>> {
            Ok(self.inbound.pop_front())
        }

        fn restart(&mut self) -> Result<()> {
            if self.fail_restarts > 0 {
                self.fail_restarts -= 1;
                return Err(TransportError::BindFailed("in use".into()));
            }
            self.restarts += 1;
            Ok(())
        }

        fn local_addr(&self) -> Option<SocketAddr> {
            None
        }
    }

    fn target() -> SocketAddr {
        "10.0.0.5:7411".parse().unwrap()
    }

    #[test]
    fn test_send_failure_restarts() {
        let t0 = Instant::now();
        let mut socket = ManagedSocket::new(
            FakeSocket {
                fail_sends: 1,
                ..Default::default()
            },
            DEFAULT_HYGIENE_INTERVAL,
            t0,
        );

        assert!(socket.send(b"x", target(), t0).is_err());
        assert_eq!(socket.inner().restarts, 1);
        assert_eq!(socket.last_restart(), Some(RestartReason::SendFailure));
        assert!(socket.is_up());

        assert!(socket.send(b"y", target(), t0).is_ok());
        assert_eq!(socket.inner().sent.len(), 1);
    }

    #[test]
    fn test_hygiene_restart_once_per_interval() {
        let t0 = Instant::now();
        let interval = Duration::from_secs(600);
        let mut socket = ManagedSocket::new(FakeSocket::default(), interval, t0);

        socket.maintain(t0 + Duration::from_secs(599));
        assert_eq!(socket.restarts(), 0);

        socket.maintain(t0 + interval);
        assert_eq!(socket.restarts(), 1);
        assert_eq!(socket.last_restart(), Some(RestartReason::Hygiene));

        socket.maintain(t0 + interval + Duration::from_secs(1));
        assert_eq!(socket.restarts(), 1);

        socket.maintain(t0 + interval * 2);
        assert_eq!(socket.restarts(), 2);
    }

    #[test]
    fn test_failed_reopen_stays_down_until_recovered() {
        let t0 = Instant::now();
        let mut socket = ManagedSocket::new(
            FakeSocket {
                fail_sends: 1,
                fail_restarts: 1,
                ..Default::default()
            },
            DEFAULT_HYGIENE_INTERVAL,
            t0,
        );

        assert!(socket.send(b"x", target(), t0).is_err());
        assert!(!socket.is_up());
        assert!(matches!(
            socket.send(b"x", target(), t0),
            Err(TransportError::NotBound)
        ));

        socket.maintain(t0 + Duration::from_millis(100));
        assert!(socket.is_up());
        assert_eq!(socket.last_restart(), Some(RestartReason::Recovery));
    }

    #[test]
    fn test_poll_recv_one_at_a_time() {
        let t0 = Instant::now();
        let mut inner = FakeSocket::default();
        for i in 0..2u8 {
            inner.inbound.push_back(Datagram {
                data: Bytes::from(vec![i]),
                from: target(),
            });
        }
        let mut socket = ManagedSocket::new(inner, DEFAULT_HYGIENE_INTERVAL, t0);

        assert_eq!(socket.poll_recv().map(|d| d.data[0]), Some(0));
        assert_eq!(socket.poll_recv().map(|d| d.data[0]), Some(1));
        assert!(socket.poll_recv().is_none());
    }
}
