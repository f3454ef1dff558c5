//! Read-only status snapshot for displays and status pages

use tally_core::{Assignment, HubAddress, TallyState};

use crate::admin::ActiveNotice;
use crate::engine::ConnectionState;

/// What a display should show, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayIndication {
    ConfigMode,
    NoNetwork,
    HubLost,
    Connecting,
    Unassigned,
    Program,
    Preview,
    Idle,
}

impl DisplayIndication {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayIndication::ConfigMode => "config-mode",
            DisplayIndication::NoNetwork => "no-network",
            DisplayIndication::HubLost => "hub-lost",
            DisplayIndication::Connecting => "connecting",
            DisplayIndication::Unassigned => "unassigned",
            DisplayIndication::Program => "program",
            DisplayIndication::Preview => "preview",
            DisplayIndication::Idle => "idle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub device_id: String,
    pub device_name: String,
    pub state: ConnectionState,
    pub link_up: bool,
    pub hub: Option<HubAddress>,
    pub assignment: Assignment,
    pub tally: TallyState,
    pub tally_trusted: bool,
    pub admin: Option<ActiveNotice>,
    pub config_mode: bool,
    pub indication: DisplayIndication,
}

/// Derive the display indication
///
/// Link and hub failures outrank tally bits so a stale program light is
/// never shown.
pub fn indication(
    state: ConnectionState,
    link_up: bool,
    config_mode: bool,
    assignment: &Assignment,
    tally: &TallyState,
) -> DisplayIndication {
    if config_mode {
        return DisplayIndication::ConfigMode;
    }
    if !link_up || state == ConnectionState::Disconnected {
        return DisplayIndication::NoNetwork;
    }
    match state {
        ConnectionState::Lost => return DisplayIndication::HubLost,
        ConnectionState::WifiUp | ConnectionState::Registering => {
            return DisplayIndication::Connecting
        }
        _ => {}
    }
    if !assignment.is_assigned() {
        DisplayIndication::Unassigned
    } else if tally.program() {
        DisplayIndication::Program
    } else if tally.preview() {
        DisplayIndication::Preview
    } else {
        DisplayIndication::Idle
    }
}
