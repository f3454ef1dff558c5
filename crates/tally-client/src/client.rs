//! The composed tally client
//!
//! [`TallyClient::tick`] is the whole scheduler: one bounded pass over the
//! link monitor, the socket, discovery, the registration engine and admin
//! notices. It never blocks and never returns an error; faults are logged and
//! recovered on later ticks.

use std::net::SocketAddr;
use std::time::Instant;
use tally_core::{decode, encode, AssignmentUpdate, DeviceIdentity, HubAddress, Outbound};
use tally_discovery::{DiscoveryAction, DiscoverySource};
use tally_transport::{Datagram, DatagramSocket, ManagedSocket, RestartReason};
use tracing::{debug, error, info, warn};

use crate::dispatch::{dispatch, Followup, NodeContext};
use crate::engine::{ConnectionState, RegistrationEngine, Request};
use crate::settings::{Settings, SettingsStore};
use crate::status::{indication, NodeStatus};
use crate::store::TallyStore;
use crate::timing::Timing;
use crate::wifi::{LinkEvent, LinkMonitor, WifiLink};

pub struct TallyClient<S, W> {
    ctx: NodeContext,
    socket: ManagedSocket<S>,
    link: W,
    monitor: LinkMonitor,
    settings: Box<dyn SettingsStore>,
    saved: Option<Settings>,
    save_failing: bool,
    timing: Timing,
    started_at: Instant,
}

impl<S: DatagramSocket, W: WifiLink> TallyClient<S, W> {
    pub(crate) fn from_parts(
        ctx: NodeContext,
        socket: S,
        link: W,
        settings: Box<dyn SettingsStore>,
        saved: Option<Settings>,
        timing: Timing,
        now: Instant,
    ) -> Self {
        Self {
            ctx,
            socket: ManagedSocket::new(socket, timing.udp_hygiene_interval, now),
            link,
            monitor: LinkMonitor::new(&timing),
            settings,
            saved,
            save_failing: false,
            timing,
            started_at: now,
        }
    }

    // ========================================================================
    // Scheduler
    // ========================================================================

    /// Run one scheduler pass
    pub fn tick(&mut self, now: Instant) {
        self.poll_link(now);

        if self.monitor.is_up() {
            self.socket.maintain(now);
        }

        self.receive(now);

        if self.monitor.is_up() {
            if self.ctx.hub.is_none() {
                self.run_discovery(now);
            }
            if let Some(hub) = self.ctx.hub {
                if let Some(request) = self.ctx.engine.poll(now) {
                    self.send_request(request, hub, now);
                }
            }
        }

        self.ctx.admin.expire(now);
        self.persist();
    }

    fn poll_link(&mut self, now: Instant) {
        match self.monitor.poll(&mut self.link, now) {
            Some(LinkEvent::Up) => {
                self.ctx.engine.link_up();
                self.ctx.store.link_restored();
                if self.ctx.hub.is_none() {
                    self.ctx.discovery.rearm();
                }
                self.socket.restart(RestartReason::Requested, now);
            }
            Some(LinkEvent::Down) => {
                self.ctx.engine.link_lost();
                self.ctx.store.link_lost();
            }
            Some(LinkEvent::ConfigModeRequired) | None => {}
        }
    }

    fn receive(&mut self, now: Instant) {
        for _ in 0..self.timing.max_datagrams_per_tick {
            let Some(datagram) = self.socket.poll_recv() else {
                break;
            };
            self.handle_datagram(datagram, now);
        }
    }

    fn handle_datagram(&mut self, datagram: Datagram, now: Instant) {
        let message = match decode(&datagram.data) {
            Ok(message) => message,
            Err(e) => {
                debug!("Dropping datagram from {}: {}", datagram.from, e);
                return;
            }
        };
        debug!("Received {} from {}", message.kind(), datagram.from);

        match dispatch(&mut self.ctx, message, now) {
            Some(Followup::AckAdmin(notice)) => {
                let ack = Outbound::admin_ack(&self.ctx.identity, &notice);
                self.send(&ack, datagram.from, now);
            }
            Some(Followup::HubResolved(hub)) => self.adopt_hub(hub, DiscoverySource::Broadcast, now),
            None => {}
        }
    }

    fn run_discovery(&mut self, now: Instant) {
        match self.ctx.discovery.poll(now) {
            Some(DiscoveryAction::Probe(targets)) => {
                let probe = Outbound::discover(&self.ctx.identity);
                for target in targets {
                    self.send(&probe, target, now);
                }
            }
            Some(DiscoveryAction::Resolved(hub)) => self.adopt_hub(hub, DiscoverySource::Mdns, now),
            None => {}
        }
    }

    /// Record a hub address, reopen the socket and register right away
    fn adopt_hub(&mut self, hub: HubAddress, source: DiscoverySource, now: Instant) {
        info!("Using hub {} ({:?})", hub, source);
        self.ctx.hub = Some(hub);
        self.ctx.discovery.resolved();
        self.ctx.engine.hub_changed();
        self.socket.restart(RestartReason::Requested, now);
        self.persist();
    }

    fn send_request(&mut self, request: Request, hub: HubAddress, now: Instant) {
        let message = match request {
            Request::Register => Outbound::register(&self.ctx.identity, self.ctx.store.assignment()),
            Request::Heartbeat => Outbound::heartbeat(
                &self.ctx.identity,
                self.ctx.store.assignment(),
                now.saturating_duration_since(self.started_at),
            ),
        };
        self.send(&message, hub.socket_addr(), now);
    }

    fn send(&mut self, message: &Outbound, target: SocketAddr, now: Instant) {
        let bytes = match encode(message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode {}: {}", message.kind(), e);
                return;
            }
        };
        match self.socket.send(&bytes, target, now) {
            Ok(()) => debug!("Sent {} to {}", message.kind(), target),
            Err(e) => warn!("Failed to send {} to {}: {}", message.kind(), target, e),
        }
    }

    /// Write settings if anything persisted has changed
    fn persist(&mut self) {
        let snapshot = Settings {
            device_id: Some(self.ctx.identity.id.clone()),
            device_name: Some(self.ctx.identity.name.clone()),
            hub: self.ctx.hub,
            assignment: self.ctx.store.assignment().clone(),
        };
        if self.saved.as_ref() == Some(&snapshot) {
            return;
        }

        match self.settings.save(&snapshot) {
            Ok(()) => {
                debug!("Settings saved");
                self.saved = Some(snapshot);
                self.save_failing = false;
            }
            Err(e) => {
                if !self.save_failing {
                    warn!("Failed to save settings: {}", e);
                }
                self.save_failing = true;
            }
        }
    }

    // ========================================================================
    // Operator intents
    // ========================================================================

    /// Bind this node to a source and tell the hub
    pub fn assign(&mut self, source_id: &str, source_name: &str, now: Instant) -> bool {
        let update = AssignmentUpdate::Assigned {
            source_id: source_id.trim().to_string(),
            source_name: source_name.trim().to_string(),
        };
        let changed = self.ctx.store.apply_assignment(&update, now);
        self.ctx.engine.refresh_registration();
        self.persist();
        changed
    }

    pub fn unassign(&mut self, now: Instant) -> bool {
        let changed = self
            .ctx
            .store
            .apply_assignment(&AssignmentUpdate::Unassigned, now);
        self.ctx.engine.refresh_registration();
        self.persist();
        changed
    }

    /// Override the label shown for the assigned source
    pub fn set_display_name(&mut self, name: &str) -> bool {
        let changed = self.ctx.store.set_display_name(name);
        self.persist();
        changed
    }

    /// Rename the node; the hub learns the new name on re-registration
    pub fn set_device_name(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || name == self.ctx.identity.name {
            return false;
        }
        info!("Device renamed to {}", name);
        self.ctx.identity.name = name.to_string();
        self.ctx.engine.refresh_registration();
        self.persist();
        true
    }

    /// Drop the current session and register again immediately
    pub fn force_reconnect(&mut self, now: Instant) {
        info!("Reconnect requested");
        self.ctx.engine.force_reconnect();
        if self.ctx.hub.is_none() {
            self.ctx.discovery.rearm();
        }
        self.socket.restart(RestartReason::Requested, now);
    }

    /// Use a manually configured hub address
    pub fn set_hub_address(&mut self, hub: HubAddress, now: Instant) {
        if self.ctx.hub == Some(hub) {
            return;
        }
        self.adopt_hub(hub, DiscoverySource::Manual, now);
    }

    /// Forget the hub address and discover it again
    pub fn forget_hub(&mut self) {
        if let Some(stale) = self.ctx.hub.take() {
            info!("Forgetting hub {}", stale);
            self.ctx.discovery.set_stale_hub(Some(stale));
            self.ctx.discovery.rearm();
            self.ctx.engine.hub_forgotten();
            self.persist();
        }
    }

    pub fn enter_config_mode(&mut self) {
        self.monitor.enter_config_mode();
    }

    pub fn clear_config_mode(&mut self) {
        self.monitor.clear_config_mode();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn status(&self) -> NodeStatus {
        let state = self.ctx.engine.state();
        let link_up = self.monitor.is_up();
        let config_mode = self.monitor.in_config_mode();
        let assignment = self.ctx.store.assignment().clone();
        let tally = *self.ctx.store.tally();

        NodeStatus {
            device_id: self.ctx.identity.id.clone(),
            device_name: self.ctx.identity.name.clone(),
            state,
            link_up,
            hub: self.ctx.hub,
            indication: indication(state, link_up, config_mode, &assignment, &tally),
            assignment,
            tally,
            tally_trusted: self.ctx.store.is_trusted(),
            admin: self.ctx.admin.current().cloned(),
            config_mode,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.ctx.engine.state()
    }

    pub fn hub(&self) -> Option<HubAddress> {
        self.ctx.hub
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.ctx.identity
    }

    pub fn engine(&self) -> &RegistrationEngine {
        &self.ctx.engine
    }

    pub fn store(&self) -> &TallyStore {
        &self.ctx.store
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    pub fn socket(&self) -> &ManagedSocket<S> {
        &self.socket
    }

    pub fn monitor(&self) -> &LinkMonitor {
        &self.monitor
    }

    pub fn link(&self) -> &W {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut W {
        &mut self.link
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }
}
