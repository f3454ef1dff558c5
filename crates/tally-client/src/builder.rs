//! Client builder pattern

use std::time::Instant;
use tally_core::{DeviceIdentity, HubAddress};
use tally_discovery::{Discovery, DiscoveryConfig, DiscoverySource, HubLookup, NoLookup};
use tally_transport::DatagramSocket;
use tracing::info;

use crate::admin::AdminBoard;
use crate::dispatch::NodeContext;
use crate::engine::RegistrationEngine;
use crate::settings::{MemorySettings, SettingsStore};
use crate::store::TallyStore;
use crate::timing::Timing;
use crate::wifi::WifiLink;
use crate::{Result, TallyClient};

/// Name used until the operator picks one
pub const DEFAULT_DEVICE_NAME: &str = "Tally Node";

/// Builder for [`TallyClient`]
///
/// Identity precedence: a persisted device id always wins, since ids never
/// change after first boot; otherwise an explicit id, then the MAC address,
/// then a generated id. An explicit name or hub address overrides the
/// persisted one.
pub struct TallyClientBuilder {
    device_id: Option<String>,
    mac: Option<[u8; 6]>,
    device_name: Option<String>,
    model: Option<String>,
    firmware: Option<String>,
    hub: Option<HubAddress>,
    timing: Timing,
    discovery: DiscoveryConfig,
    lookup: Option<Box<dyn HubLookup>>,
    settings: Option<Box<dyn SettingsStore>>,
}

impl TallyClientBuilder {
    pub fn new() -> Self {
        Self {
            device_id: None,
            mac: None,
            device_name: None,
            model: None,
            firmware: None,
            hub: None,
            timing: Timing::default(),
            discovery: DiscoveryConfig::default(),
            lookup: None,
            settings: None,
        }
    }

    /// Device id to use on first boot
    pub fn device_id(mut self, id: &str) -> Self {
        self.device_id = Some(id.to_string());
        self
    }

    /// Derive the first-boot device id from a MAC address
    pub fn mac(mut self, mac: [u8; 6]) -> Self {
        self.mac = Some(mac);
        self
    }

    pub fn device_name(mut self, name: &str) -> Self {
        self.device_name = Some(name.to_string());
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn firmware(mut self, firmware: &str) -> Self {
        self.firmware = Some(firmware.to_string());
        self
    }

    /// Skip discovery and use this hub
    pub fn hub(mut self, hub: HubAddress) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn discovery(mut self, config: DiscoveryConfig) -> Self {
        self.discovery = config;
        self
    }

    /// Service lookup used once broadcast probes are exhausted
    pub fn lookup(mut self, lookup: Box<dyn HubLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn settings(mut self, store: Box<dyn SettingsStore>) -> Self {
        self.settings = Some(store);
        self
    }

    /// Load settings and assemble the client
    pub fn build<S: DatagramSocket, W: WifiLink>(
        self,
        socket: S,
        link: W,
        now: Instant,
    ) -> Result<TallyClient<S, W>> {
        let mut settings = self
            .settings
            .unwrap_or_else(|| Box::new(MemorySettings::new()));
        let saved = settings.load()?;

        let name = self
            .device_name
            .or_else(|| saved.device_name.clone())
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());

        let mut identity = match (&saved.device_id, self.device_id, self.mac) {
            (Some(id), _, _) => DeviceIdentity::new(id.as_str(), name),
            (None, Some(id), _) => DeviceIdentity::new(id, name),
            (None, None, Some(mac)) => DeviceIdentity::from_mac(mac, name),
            (None, None, None) => DeviceIdentity::generate(name),
        };
        if let Some(model) = &self.model {
            identity = identity.with_model(model);
        }
        if let Some(firmware) = &self.firmware {
            identity = identity.with_firmware(firmware);
        }

        let (hub, source) = match (self.hub, saved.hub) {
            (Some(hub), _) => (Some(hub), Some(DiscoverySource::Manual)),
            (None, Some(hub)) => (Some(hub), Some(DiscoverySource::Persisted)),
            (None, None) => (None, None),
        };
        match (hub, source) {
            (Some(hub), Some(source)) => {
                info!("Node {} ({}) using hub {} ({:?})", identity.id, identity.name, hub, source)
            }
            _ => info!("Node {} ({}) hub unknown, discovering", identity.id, identity.name),
        }

        let lookup = self.lookup.unwrap_or_else(|| Box::new(NoLookup));
        let mut discovery = Discovery::new(self.discovery, lookup);
        if hub.is_some() {
            discovery.resolved();
        }

        let ctx = NodeContext {
            identity,
            hub,
            engine: RegistrationEngine::new(self.timing.clone()),
            store: TallyStore::new(saved.assignment.clone()),
            discovery,
            admin: AdminBoard::new(self.timing.admin_default_duration),
        };

        Ok(TallyClient::from_parts(
            ctx,
            socket,
            link,
            settings,
            Some(saved),
            self.timing,
            now,
        ))
    }
}

impl Default for TallyClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
