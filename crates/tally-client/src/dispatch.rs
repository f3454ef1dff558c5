//! Inbound message routing
//!
//! Each decoded message goes to exactly one handler. Known messages count as
//! hub traffic before they are routed; `Unknown` touches nothing.

use std::time::Instant;
use tally_core::{AdminNotice, DeviceIdentity, HubAddress, Inbound};
use tally_discovery::Discovery;
use tracing::{debug, info};

use crate::admin::AdminBoard;
use crate::engine::RegistrationEngine;
use crate::store::TallyStore;

/// Node state shared by the dispatcher, the tick loop and operator intents
pub struct NodeContext {
    pub identity: DeviceIdentity,
    pub hub: Option<HubAddress>,
    pub engine: RegistrationEngine,
    pub store: TallyStore,
    pub discovery: Discovery,
    pub admin: AdminBoard,
}

/// Work the client must finish after a message was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Followup {
    /// Confirm an admin notice to the hub
    AckAdmin(AdminNotice),
    /// A hub address other than the current one was announced
    HubResolved(HubAddress),
}

/// Apply one inbound message
pub fn dispatch(ctx: &mut NodeContext, message: Inbound, now: Instant) -> Option<Followup> {
    if message == Inbound::Unknown {
        debug!("Ignoring message with unknown type");
        return None;
    }
    ctx.engine.hub_traffic(now);

    match message {
        Inbound::Registered => {
            ctx.engine.registered(now);
            None
        }
        Inbound::HeartbeatAck => None,
        Inbound::RegisterRequired => {
            ctx.engine.registration_required();
            None
        }
        Inbound::DiscoverReply(hub) => {
            if ctx.hub == Some(hub) {
                return None;
            }
            info!("Hub discovered at {}", hub);
            Some(Followup::HubResolved(hub))
        }
        Inbound::Tally(update) => {
            ctx.store.apply_tally(&update, now);
            None
        }
        Inbound::Assignment(update) => {
            ctx.store.apply_assignment(&update, now);
            None
        }
        Inbound::AdminMessage(notice) => {
            ctx.admin.show(notice.clone(), now);
            Some(Followup::AckAdmin(notice))
        }
        Inbound::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::Timing;
    use std::time::Duration;
    use tally_core::AssignmentUpdate;
    use tally_discovery::{DiscoveryConfig, DiscoveryPhase};

    fn context(hub: Option<HubAddress>) -> NodeContext {
        NodeContext {
            identity: DeviceIdentity::new("tally-test01", "Stage Left"),
            hub,
            engine: RegistrationEngine::new(Timing::default()),
            store: TallyStore::default(),
            discovery: Discovery::broadcast_only(DiscoveryConfig::default()),
            admin: AdminBoard::new(Duration::from_secs(10)),
        }
    }

    #[test]
    fn test_discover_reply_is_left_to_the_client() {
        let hub: HubAddress = "10.0.0.5:7411".parse().unwrap();
        let mut ctx = context(None);

        let followup = dispatch(&mut ctx, Inbound::DiscoverReply(hub), Instant::now());
        assert_eq!(followup, Some(Followup::HubResolved(hub)));
        assert_eq!(ctx.hub, None);
        assert_eq!(ctx.discovery.phase(), DiscoveryPhase::Probing { attempts: 0 });
    }

    #[test]
    fn test_discover_reply_for_current_hub_ignored() {
        let hub: HubAddress = "10.0.0.5:7411".parse().unwrap();
        let mut ctx = context(Some(hub));
        assert_eq!(dispatch(&mut ctx, Inbound::DiscoverReply(hub), Instant::now()), None);
    }

    #[test]
    fn test_assignment_needs_no_followup() {
        let mut ctx = context(None);
        let update = AssignmentUpdate::Assigned {
            source_id: "cam1".to_string(),
            source_name: "Camera 1".to_string(),
        };

        assert_eq!(dispatch(&mut ctx, Inbound::Assignment(update), Instant::now()), None);
        assert_eq!(ctx.store.assignment().source_id(), "cam1");
    }
}
