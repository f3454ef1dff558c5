//! Device-side data model

use crate::{Error, Result, DEFAULT_UDP_PORT, DEVICE_ID_PREFIX, DEVICE_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Instant;

/// Identity a node presents to the hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Stable id, never changes after first boot
    pub id: String,
    /// Human display name
    pub name: String,
    /// Hardware model string
    pub model: String,
    /// Firmware version string
    pub firmware: String,
}

impl DeviceIdentity {
    /// Create an identity with an explicit id
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: DEVICE_TYPE.to_string(),
            firmware: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Derive the identity from a hardware MAC address
    pub fn from_mac(mac: [u8; 6], name: impl Into<String>) -> Self {
        Self::new(mac_device_id(mac), name)
    }

    /// Create an identity with a freshly generated id, for hosts without a usable MAC
    pub fn generate(name: impl Into<String>) -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self::new(format!("{}{}", DEVICE_ID_PREFIX, &uuid[..12]), name)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_firmware(mut self, firmware: &str) -> Self {
        self.firmware = firmware.to_string();
        self
    }
}

/// Device id for a MAC address, e.g. `tally-a1b2c3d4e5f6`
pub fn mac_device_id(mac: [u8; 6]) -> String {
    let hex: String = mac.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}{}", DEVICE_ID_PREFIX, hex)
}

/// Network location of the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HubAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl HubAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl From<SocketAddr> for HubAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for HubAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.socket_addr().fmt(f)
    }
}

/// Accepts `ip:port` or a bare ip (default port)
impl FromStr for HubAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }
        s.parse::<IpAddr>()
            .map(|ip| HubAddress::new(ip, DEFAULT_UDP_PORT))
            .map_err(|_| Error::InvalidAddress(s.to_string()))
    }
}

/// Binding of this node to a hub source
///
/// An empty `source_id` means unassigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(default)]
    source_id: String,
    #[serde(default)]
    source_name: String,
    #[serde(default)]
    display_name: String,
}

impl Assignment {
    pub fn new(source_id: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            source_name: source_name.into(),
            display_name: String::new(),
        }
    }

    pub fn unassigned() -> Self {
        Self::default()
    }

    /// Operator override shown instead of the hub's source name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn is_assigned(&self) -> bool {
        !self.source_id.is_empty()
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Text a display should show: override, then source name, then id
    pub fn label(&self) -> &str {
        if !self.display_name.is_empty() {
            &self.display_name
        } else if !self.source_name.is_empty() {
            &self.source_name
        } else {
            &self.source_id
        }
    }
}

/// Live state of the assigned source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallyState {
    program: bool,
    preview: bool,
    recording: bool,
    streaming: bool,
    updated_at: Option<Instant>,
}

impl TallyState {
    pub fn new(program: bool, preview: bool, recording: bool, streaming: bool, at: Instant) -> Self {
        Self {
            program,
            preview,
            recording,
            streaming,
            updated_at: Some(at),
        }
    }

    /// All bits false, stamped with the time of the reset
    pub fn cleared(at: Instant) -> Self {
        Self::new(false, false, false, false, at)
    }

    pub fn program(&self) -> bool {
        self.program
    }

    pub fn preview(&self) -> bool {
        self.preview
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn streaming(&self) -> bool {
        self.streaming
    }

    pub fn updated_at(&self) -> Option<Instant> {
        self.updated_at
    }

    pub fn any(&self) -> bool {
        self.program || self.preview || self.recording || self.streaming
    }

    /// Compare bits only, ignoring the update time
    pub fn same_bits(&self, other: &TallyState) -> bool {
        self.program == other.program
            && self.preview == other.preview
            && self.recording == other.recording
            && self.streaming == other.streaming
    }
}
