//! Tally Client
//!
//! The connectivity and state core of a tally node. One [`TallyClient`] owns
//! the UDP socket, the registration engine, the tally/assignment store and
//! the link monitor, and advances all of them from a single
//! [`TallyClient::tick`] call.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Instant;
//! use tally_client::{TallyClientBuilder, WifiLink};
//! use tally_transport::UdpTransport;
//!
//! struct AlwaysUp;
//!
//! impl WifiLink for AlwaysUp {
//!     fn is_connected(&mut self) -> bool { true }
//!     fn reconnect(&mut self) -> bool { true }
//! }
//!
//! # fn main() -> tally_client::Result<()> {
//! let socket = UdpTransport::bind("0.0.0.0:7411".parse().unwrap())?;
//! let mut client = TallyClientBuilder::new()
//!     .device_name("Camera 1 tally")
//!     .build(socket, AlwaysUp, Instant::now())?;
//!
//! loop {
//!     client.tick(Instant::now());
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! # }
//! ```

pub mod admin;
pub mod builder;
pub mod client;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod settings;
pub mod status;
pub mod store;
pub mod timing;
pub mod wifi;

pub use admin::{ActiveNotice, AdminBoard};
pub use builder::{TallyClientBuilder, DEFAULT_DEVICE_NAME};
pub use client::TallyClient;
pub use dispatch::{dispatch, Followup, NodeContext};
pub use engine::{ConnectionState, ReconnectCounters, RegistrationEngine, Request};
pub use error::{ClientError, Result};
pub use settings::{JsonFileStore, MemorySettings, Settings, SettingsStore};
pub use status::{DisplayIndication, NodeStatus};
pub use store::TallyStore;
pub use timing::Timing;
pub use wifi::{LinkEvent, LinkMonitor, WifiLink};

// Re-export core types
pub use tally_core::{Assignment, DeviceIdentity, HubAddress, TallyState};
