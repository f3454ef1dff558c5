//! Node configuration
//!
//! An optional TOML file, with command-line flags layered on top:
//!
//! ```toml
//! name = "Camera 1 tally"
//! hub = "10.0.0.5:7411"
//! port = 7411
//! netmask = "255.255.255.0"
//!
//! [timing]
//! heartbeat_interval = 30
//! hub_timeout = 60
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_client::Timing;
use tally_core::{HubAddress, DEFAULT_UDP_PORT};

/// Address used to check that the host has a routable network
pub const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";

/// Contents of the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub name: Option<String>,
    pub hub: Option<String>,
    pub port: Option<u16>,
    pub settings: Option<PathBuf>,
    pub probe_addr: Option<SocketAddr>,
    /// Netmask of the hub's subnet; probes use the directed broadcast
    pub netmask: Option<Ipv4Addr>,
    pub timing: TimingConfig,
}

/// `[timing]` table; durations in seconds
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub heartbeat_interval: Option<u64>,
    pub hub_timeout: Option<u64>,
    pub min_reconnect_interval: Option<u64>,
    pub fast_retry_ceiling: Option<u32>,
    pub slow_retry_cooldown: Option<u64>,
    pub wifi_poll_interval: Option<u64>,
    pub wifi_reconnect_interval: Option<u64>,
    pub wifi_reconnect_ceiling: Option<u32>,
    pub udp_hygiene_interval: Option<u64>,
    pub admin_default_duration: Option<u64>,
}

impl TimingConfig {
    /// Overlay the configured values on `timing`
    pub fn apply(&self, mut timing: Timing) -> Timing {
        let secs = |v: Option<u64>, d: &mut Duration| {
            if let Some(v) = v {
                *d = Duration::from_secs(v);
            }
        };
        secs(self.heartbeat_interval, &mut timing.heartbeat_interval);
        secs(self.hub_timeout, &mut timing.hub_timeout);
        secs(self.min_reconnect_interval, &mut timing.min_reconnect_interval);
        secs(self.slow_retry_cooldown, &mut timing.slow_retry_cooldown);
        secs(self.wifi_poll_interval, &mut timing.wifi_poll_interval);
        secs(self.wifi_reconnect_interval, &mut timing.wifi_reconnect_interval);
        secs(self.udp_hygiene_interval, &mut timing.udp_hygiene_interval);
        secs(self.admin_default_duration, &mut timing.admin_default_duration);
        if let Some(n) = self.fast_retry_ceiling {
            timing.fast_retry_ceiling = n;
        }
        if let Some(n) = self.wifi_reconnect_ceiling {
            timing.wifi_reconnect_ceiling = n;
        }
        timing
    }
}

impl FileConfig {
    /// Read the file, or fall back to defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub hub: Option<HubAddress>,
    pub port: Option<u16>,
    pub settings: Option<PathBuf>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub name: Option<String>,
    pub hub: Option<HubAddress>,
    pub port: u16,
    pub settings_path: PathBuf,
    pub probe_addr: SocketAddr,
    pub netmask: Option<Ipv4Addr>,
    pub timing: Timing,
}

impl NodeConfig {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let file_hub = file
            .hub
            .as_deref()
            .map(|s| s.parse::<HubAddress>())
            .transpose()
            .context("Invalid hub address in config file")?;

        let probe_addr = match file.probe_addr {
            Some(addr) => addr,
            None => DEFAULT_PROBE_ADDR.parse()?,
        };

        Ok(Self {
            name: overrides.name.or(file.name),
            hub: overrides.hub.or(file_hub),
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_UDP_PORT),
            settings_path: overrides
                .settings
                .or(file.settings)
                .unwrap_or_else(default_settings_path),
            probe_addr,
            netmask: file.netmask,
            timing: file.timing.apply(Timing::default()),
        })
    }
}

/// Settings file under the platform config directory
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally-node")
        .join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = NodeConfig::resolve(FileConfig::default(), Overrides::default()).unwrap();
        assert_eq!(config.port, DEFAULT_UDP_PORT);
        assert_eq!(config.hub, None);
        assert_eq!(config.netmask, None);
        assert_eq!(config.timing, Timing::default());
        assert!(config.settings_path.ends_with("tally-node/settings.json"));
    }

    #[test]
    fn test_parse_timing_table() {
        let file = FileConfig::parse(
            r#"
            name = "Stage Left"
            hub = "10.0.0.5"
            netmask = "255.255.0.0"

            [timing]
            heartbeat_interval = 10
            fast_retry_ceiling = 3
            "#,
        )
        .unwrap();

        let config = NodeConfig::resolve(file, Overrides::default()).unwrap();
        assert_eq!(config.name.as_deref(), Some("Stage Left"));
        assert_eq!(config.hub, Some("10.0.0.5:7411".parse().unwrap()));
        assert_eq!(config.netmask, Some(Ipv4Addr::new(255, 255, 0, 0)));
        assert_eq!(config.timing.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.timing.fast_retry_ceiling, 3);
        assert_eq!(config.timing.hub_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides_win() {
        let file = FileConfig::parse("name = \"From File\"\nport = 9000\n").unwrap();
        let overrides = Overrides {
            name: Some("From Flag".to_string()),
            port: Some(7500),
            ..Default::default()
        };

        let config = NodeConfig::resolve(file, overrides).unwrap();
        assert_eq!(config.name.as_deref(), Some("From Flag"));
        assert_eq!(config.port, 7500);
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(FileConfig::parse("hub_ip = \"10.0.0.5\"\n").is_err());
    }

    #[test]
    fn test_rejects_bad_hub() {
        let file = FileConfig::parse("hub = \"hub.local\"\n").unwrap();
        assert!(NodeConfig::resolve(file, Overrides::default()).is_err());
    }
}
