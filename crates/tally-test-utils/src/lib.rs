//! Common test helpers for tally node tests
//!
//! This crate provides deterministic stand-ins for every external
//! collaborator of the client core:
//! - [`MockSocket`]: scripted inbound datagrams, captured outbound ones
//! - [`ScriptedLink`]: a WiFi link whose state the test controls
//! - [`ScriptedLookup`]: a service lookup that answers on cue
//! - [`Clock`]: explicit time for tick-driven state machines
//! - [`hub`]: JSON bodies the hub sends
//!
//! All handles are cheap clones sharing state, so a test keeps one copy while
//! the client owns the other.

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tally_core::HubAddress;
use tally_discovery::{DiscoveryError, HubLookup};
use tally_transport::{Datagram, DatagramSocket, TransportError};

pub use tally_client::MemorySettings;

/// Hub address used throughout the tests
pub fn hub_addr() -> HubAddress {
    "10.0.0.5:7411".parse().expect("valid hub address")
}

// ============================================================================
// Clock
// ============================================================================

/// Monotonic test time
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    now: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self { now: Instant::now() }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Move time forward and return the new instant
    pub fn advance(&mut self, by: Duration) -> Instant {
        self.now += by;
        self.now
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Mock Socket
// ============================================================================

/// A datagram the client sent
#[derive(Debug, Clone)]
pub struct SentDatagram {
    pub data: Bytes,
    pub target: SocketAddr,
}

impl SentDatagram {
    /// Parse the payload as JSON
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.data).unwrap_or(Value::Null)
    }

    /// The `type` tag, if any
    pub fn kind(&self) -> String {
        self.json()["type"].as_str().unwrap_or_default().to_string()
    }
}

#[derive(Debug)]
struct SocketInner {
    local: SocketAddr,
    inbound: VecDeque<Datagram>,
    sent: Vec<SentDatagram>,
    fail_sends: usize,
    fail_restarts: usize,
    restarts: usize,
    bound: bool,
}

#[derive(Debug, Clone)]
pub struct MockSocket {
    inner: Arc<Mutex<SocketInner>>,
}

impl MockSocket {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SocketInner {
                local: SocketAddr::from(([10, 0, 0, 42], 7411)),
                inbound: VecDeque::new(),
                sent: Vec::new(),
                fail_sends: 0,
                fail_restarts: 0,
                restarts: 0,
                bound: true,
            })),
        }
    }

    /// Queue a raw datagram
    pub fn push_bytes(&self, data: impl Into<Bytes>, from: SocketAddr) {
        self.inner.lock().inbound.push_back(Datagram {
            data: data.into(),
            from,
        });
    }

    /// Queue a datagram from the hub
    pub fn push_from_hub(&self, json: &str) {
        self.push_bytes(Bytes::copy_from_slice(json.as_bytes()), hub_addr().socket_addr());
    }

    pub fn pending_inbound(&self) -> usize {
        self.inner.lock().inbound.len()
    }

    /// Make the next `n` sends fail
    pub fn fail_next_sends(&self, n: usize) {
        self.inner.lock().fail_sends = n;
    }

    /// Make the next `n` reopens fail
    pub fn fail_next_restarts(&self, n: usize) {
        self.inner.lock().fail_restarts = n;
    }

    pub fn restarts(&self) -> usize {
        self.inner.lock().restarts
    }

    pub fn sent(&self) -> Vec<SentDatagram> {
        self.inner.lock().sent.clone()
    }

    /// Sent datagrams whose `type` tag matches
    pub fn sent_of_kind(&self, kind: &str) -> Vec<SentDatagram> {
        self.sent().into_iter().filter(|d| d.kind() == kind).collect()
    }

    /// Remove and return everything sent so far
    pub fn take_sent(&self) -> Vec<SentDatagram> {
        std::mem::take(&mut self.inner.lock().sent)
    }
}

impl Default for MockSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramSocket for MockSocket {
    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> tally_transport::Result<()> {
        let mut inner = self.inner.lock();
        if !inner.bound {
            return Err(TransportError::NotBound);
        }
        if inner.fail_sends > 0 {
            inner.fail_sends -= 1;
            return Err(TransportError::SendFailed(format!("{}: network unreachable", target)));
        }
        inner.sent.push(SentDatagram {
            data: Bytes::copy_from_slice(data),
            target,
        });
        Ok(())
    }

    fn poll_recv(&mut self) -> tally_transport::Result<Option<Datagram>> {
        let mut inner = self.inner.lock();
        if !inner.bound {
            return Err(TransportError::NotBound);
        }
        Ok(inner.inbound.pop_front())
    }

    fn restart(&mut self) -> tally_transport::Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_restarts > 0 {
            inner.fail_restarts -= 1;
            inner.bound = false;
            return Err(TransportError::BindFailed("address in use".to_string()));
        }
        inner.bound = true;
        inner.restarts += 1;
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        let inner = self.inner.lock();
        inner.bound.then_some(inner.local)
    }
}

// ============================================================================
// Scripted Link
// ============================================================================

#[derive(Debug)]
struct LinkInner {
    connected: bool,
    reconnect_results: VecDeque<bool>,
    reconnects: usize,
}

/// WiFi link under test control
///
/// `reconnect` pops queued results; with none queued it fails.
#[derive(Debug, Clone)]
pub struct ScriptedLink {
    inner: Arc<Mutex<LinkInner>>,
}

impl ScriptedLink {
    pub fn new(connected: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LinkInner {
                connected,
                reconnect_results: VecDeque::new(),
                reconnects: 0,
            })),
        }
    }

    pub fn up() -> Self {
        Self::new(true)
    }

    pub fn down() -> Self {
        Self::new(false)
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().connected = connected;
    }

    pub fn queue_reconnect(&self, succeeds: bool) {
        self.inner.lock().reconnect_results.push_back(succeeds);
    }

    /// Reconnections attempted so far
    pub fn reconnects(&self) -> usize {
        self.inner.lock().reconnects
    }
}

impl tally_client::WifiLink for ScriptedLink {
    fn is_connected(&mut self) -> bool {
        self.inner.lock().connected
    }

    fn reconnect(&mut self) -> bool {
        let mut inner = self.inner.lock();
        inner.reconnects += 1;
        let ok = inner.reconnect_results.pop_front().unwrap_or(false);
        if ok {
            inner.connected = true;
        }
        ok
    }
}

// ============================================================================
// Scripted Lookup
// ============================================================================

#[derive(Debug, Default)]
struct LookupInner {
    answer: Option<HubAddress>,
    starts: usize,
    stops: usize,
    active: bool,
    unavailable: bool,
}

/// Service lookup under test control
#[derive(Debug, Clone, Default)]
pub struct ScriptedLookup {
    inner: Arc<Mutex<LookupInner>>,
}

impl ScriptedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup whose `start` always fails
    pub fn unavailable() -> Self {
        let lookup = Self::default();
        lookup.inner.lock().unavailable = true;
        lookup
    }

    /// Answer with this address on the next poll of an active query
    pub fn answer(&self, hub: HubAddress) {
        self.inner.lock().answer = Some(hub);
    }

    pub fn starts(&self) -> usize {
        self.inner.lock().starts
    }

    pub fn stops(&self) -> usize {
        self.inner.lock().stops
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }
}

impl HubLookup for ScriptedLookup {
    fn start(&mut self) -> tally_discovery::Result<()> {
        let mut inner = self.inner.lock();
        if inner.unavailable {
            return Err(DiscoveryError::Mdns("multicast unavailable".to_string()));
        }
        inner.starts += 1;
        inner.active = true;
        Ok(())
    }

    fn poll(&mut self) -> Option<HubAddress> {
        let mut inner = self.inner.lock();
        if !inner.active {
            return None;
        }
        let answer = inner.answer.take();
        if answer.is_some() {
            inner.active = false;
        }
        answer
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock();
        inner.stops += 1;
        inner.active = false;
    }
}

// ============================================================================
// Hub Messages
// ============================================================================

/// JSON bodies as the hub sends them
pub mod hub {
    use serde_json::json;

    pub fn registered(device_id: &str) -> String {
        json!({"type": "registered", "deviceId": device_id, "timestamp": "2024-05-01T12:00:00Z"}).to_string()
    }

    pub fn heartbeat_ack() -> String {
        json!({"type": "heartbeat_ack", "timestamp": "2024-05-01T12:00:30Z"}).to_string()
    }

    pub fn register_required() -> String {
        json!({"type": "register_required", "message": "Device not registered"}).to_string()
    }

    pub fn discover_reply(hub_ip: &str, udp_port: u16) -> String {
        json!({"type": "discover_reply", "hubIp": hub_ip, "udpPort": udp_port, "apiPort": 3000}).to_string()
    }

    pub fn tally(source_id: &str, program: bool, preview: bool) -> String {
        json!({"type": "tally", "sourceId": source_id, "program": program, "preview": preview}).to_string()
    }

    /// Tally in the `data`-nested form
    pub fn tally_nested(source_id: &str, program: bool, preview: bool, recording: bool, streaming: bool) -> String {
        json!({
            "type": "tally",
            "data": {
                "id": source_id,
                "name": source_id,
                "program": program,
                "preview": preview,
                "recording": recording,
                "streaming": streaming
            }
        })
        .to_string()
    }

    pub fn assignment(source_id: &str, source_name: &str) -> String {
        json!({"type": "assignment", "mode": "assigned", "sourceId": source_id, "sourceName": source_name})
            .to_string()
    }

    pub fn unassigned() -> String {
        json!({"type": "assignment", "mode": "unassigned", "sourceId": "", "sourceName": ""}).to_string()
    }

    pub fn admin_message(id: &str, text: &str, duration_ms: Option<u64>) -> String {
        let mut body = json!({"type": "admin_message", "id": id, "text": text, "color": "#ffaa00"});
        if let Some(ms) = duration_ms {
            body["duration"] = json!(ms);
        }
        body.to_string()
    }
}
