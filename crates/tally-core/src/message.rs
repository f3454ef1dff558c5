//! Hub message catalog
//!
//! Every datagram is a flat JSON object with a `type` tag. Outbound messages
//! serialize directly; inbound messages go through a wire layer that accepts
//! both the flat and the `data`-nested bodies the hub emits, then validate
//! into [`Inbound`].

use crate::types::{Assignment, DeviceIdentity, HubAddress};
use crate::{Error, Result, DEVICE_TYPE};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

// ============================================================================
// Outbound (node -> hub)
// ============================================================================

/// Message sent from the node to the hub
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Register(RegisterMessage),
    Heartbeat(HeartbeatMessage),
    Discover(DiscoverMessage),
    AdminMessageAck(AdminAckMessage),
}

/// REGISTER - request or refresh hub registration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMessage {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    pub model: String,
    pub firmware: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_source: Option<String>,
    pub is_assigned: bool,
}

/// HEARTBEAT - liveness ping while registered
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatMessage {
    pub device_id: String,
    pub assigned_source: String,
    /// Milliseconds since the node started
    pub uptime: u64,
}

/// DISCOVER - broadcast probe
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverMessage {
    pub device_id: String,
}

/// ADMIN_MESSAGE_ACK - confirms an admin notice was shown
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAckMessage {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub method: String,
    pub text_snippet: String,
}

impl Outbound {
    /// Registration carrying the current assignment
    pub fn register(identity: &DeviceIdentity, assignment: &Assignment) -> Self {
        let assigned = assignment.is_assigned();
        Outbound::Register(RegisterMessage {
            device_id: identity.id.clone(),
            device_name: identity.name.clone(),
            device_type: DEVICE_TYPE.to_string(),
            model: identity.model.clone(),
            firmware: identity.firmware.clone(),
            assigned_source: assigned.then(|| assignment.source_id().to_string()),
            is_assigned: assigned,
        })
    }

    pub fn heartbeat(identity: &DeviceIdentity, assignment: &Assignment, uptime: Duration) -> Self {
        Outbound::Heartbeat(HeartbeatMessage {
            device_id: identity.id.clone(),
            assigned_source: assignment.source_id().to_string(),
            uptime: uptime.as_millis() as u64,
        })
    }

    pub fn discover(identity: &DeviceIdentity) -> Self {
        Outbound::Discover(DiscoverMessage {
            device_id: identity.id.clone(),
        })
    }

    pub fn admin_ack(identity: &DeviceIdentity, notice: &AdminNotice) -> Self {
        Outbound::AdminMessageAck(AdminAckMessage {
            device_id: identity.id.clone(),
            id: notice.id.clone(),
            method: "display".to_string(),
            text_snippet: notice.text.chars().take(20).collect(),
        })
    }

    /// Wire tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::Register(_) => "register",
            Outbound::Heartbeat(_) => "heartbeat",
            Outbound::Discover(_) => "discover",
            Outbound::AdminMessageAck(_) => "admin_message_ack",
        }
    }
}

// ============================================================================
// Inbound (hub -> node)
// ============================================================================

/// Validated message received from the hub
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Registration confirmed
    Registered,
    /// Heartbeat confirmed
    HeartbeatAck,
    /// Hub lost its record of this node
    RegisterRequired,
    /// Reply to a discovery probe
    DiscoverReply(HubAddress),
    /// Live state of one source
    Tally(TallyUpdate),
    /// New binding for this node
    Assignment(AssignmentUpdate),
    /// Advisory operator notice
    AdminMessage(AdminNotice),
    /// Well-formed message with a tag this node does not handle
    Unknown,
}

impl Inbound {
    /// Wire tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::Registered => "registered",
            Inbound::HeartbeatAck => "heartbeat_ack",
            Inbound::RegisterRequired => "register_required",
            Inbound::DiscoverReply(_) => "discover_reply",
            Inbound::Tally(_) => "tally",
            Inbound::Assignment(_) => "assignment",
            Inbound::AdminMessage(_) => "admin_message",
            Inbound::Unknown => "unknown",
        }
    }
}

/// Tally bits for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyUpdate {
    pub source_id: String,
    pub source_name: Option<String>,
    pub program: bool,
    pub preview: bool,
    pub recording: bool,
    pub streaming: bool,
}

/// Assignment change pushed by the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentUpdate {
    Assigned { source_id: String, source_name: String },
    Unassigned,
}

/// Operator notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminNotice {
    pub id: Option<String>,
    pub text: String,
    pub color: Option<String>,
    pub duration: Option<Duration>,
}

// ============================================================================
// Wire layer
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum WireInbound {
    Registered,
    HeartbeatAck,
    RegisterRequired,
    DiscoverReply(WireDiscoverReply),
    Tally(Nestable<WireTally>),
    Assignment(Nestable<WireAssignment>),
    AdminMessage(WireAdmin),
    #[serde(other)]
    Unknown,
}

/// Body sent either flat or under a `data` key
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Nestable<T> {
    Nested { data: T },
    Flat(T),
}

impl<T> Nestable<T> {
    fn into_inner(self) -> T {
        match self {
            Nestable::Nested { data } => data,
            Nestable::Flat(body) => body,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireDiscoverReply {
    hub_ip: String,
    udp_port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireTally {
    #[serde(alias = "id")]
    source_id: String,
    #[serde(default, alias = "name")]
    source_name: Option<String>,
    program: bool,
    preview: bool,
    #[serde(default)]
    recording: Option<bool>,
    #[serde(default)]
    streaming: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum WireMode {
    Assigned,
    Unassigned,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireAssignment {
    #[serde(default)]
    mode: Option<WireMode>,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    source_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAdmin {
    text: String,
    #[serde(default)]
    color: Option<String>,
    /// Milliseconds
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    id: Option<String>,
}

impl WireInbound {
    /// Validate into the public message type
    pub(crate) fn validate(self) -> Result<Inbound> {
        Ok(match self {
            WireInbound::Registered => Inbound::Registered,
            WireInbound::HeartbeatAck => Inbound::HeartbeatAck,
            WireInbound::RegisterRequired => Inbound::RegisterRequired,
            WireInbound::DiscoverReply(reply) => {
                let ip: IpAddr = reply.hub_ip.trim().parse().map_err(|_| Error::InvalidField {
                    field: "hubIp",
                    reason: format!("not an ip address: {:?}", reply.hub_ip),
                })?;
                if ip.is_unspecified() {
                    return Err(Error::InvalidField {
                        field: "hubIp",
                        reason: "unspecified address".to_string(),
                    });
                }
                if reply.udp_port == 0 {
                    return Err(Error::InvalidField {
                        field: "udpPort",
                        reason: "port 0".to_string(),
                    });
                }
                Inbound::DiscoverReply(HubAddress::new(ip, reply.udp_port))
            }
            WireInbound::Tally(body) => {
                let tally = body.into_inner();
                if tally.source_id.is_empty() {
                    return Err(Error::MissingField("sourceId"));
                }
                Inbound::Tally(TallyUpdate {
                    source_id: tally.source_id,
                    source_name: tally.source_name,
                    program: tally.program,
                    preview: tally.preview,
                    recording: tally.recording.unwrap_or(false),
                    streaming: tally.streaming.unwrap_or(false),
                })
            }
            WireInbound::Assignment(body) => {
                let assignment = body.into_inner();
                let source_id = assignment.source_id.unwrap_or_default();
                let mode = match assignment.mode {
                    Some(mode) => mode,
                    None if source_id.is_empty() => WireMode::Unassigned,
                    None => WireMode::Assigned,
                };
                match mode {
                    WireMode::Assigned if source_id.is_empty() => {
                        return Err(Error::MissingField("sourceId"));
                    }
                    WireMode::Assigned => Inbound::Assignment(AssignmentUpdate::Assigned {
                        source_id,
                        source_name: assignment.source_name.unwrap_or_default(),
                    }),
                    WireMode::Unassigned => Inbound::Assignment(AssignmentUpdate::Unassigned),
                }
            }
            WireInbound::AdminMessage(admin) => Inbound::AdminMessage(AdminNotice {
                id: admin.id,
                text: admin.text,
                color: admin.color,
                duration: admin.duration.map(Duration::from_millis),
            }),
            WireInbound::Unknown => Inbound::Unknown,
        })
    }
}
