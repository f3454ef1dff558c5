//! Service lookup seam

use crate::error::{DiscoveryError, Result};
use tally_core::HubAddress;

/// A hub lookup that is started once and then polled without blocking
pub trait HubLookup {
    /// Begin a query
    fn start(&mut self) -> Result<()>;

    /// Return the hub address once the query has produced one
    fn poll(&mut self) -> Option<HubAddress>;

    /// Abandon the query
    fn stop(&mut self);
}

/// Lookup for builds or hosts without a service directory
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLookup;

impl HubLookup for NoLookup {
    fn start(&mut self) -> Result<()> {
        Err(DiscoveryError::Unavailable)
    }

    fn poll(&mut self) -> Option<HubAddress> {
        None
    }

    fn stop(&mut self) {}
}

impl<L: HubLookup + ?Sized> HubLookup for Box<L> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn poll(&mut self) -> Option<HubAddress> {
        (**self).poll()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}
