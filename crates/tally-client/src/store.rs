//! Tally/Assignment store
//!
//! The single place the node's assignment and tally bits change. Every
//! mutation leaves `tally.any() => assignment.is_assigned()` true.

use std::time::Instant;
use tally_core::{Assignment, AssignmentUpdate, TallyState, TallyUpdate};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct TallyStore {
    assignment: Assignment,
    tally: TallyState,
    trusted: bool,
}

impl TallyStore {
    /// Start from a persisted assignment; tally bits always start cleared
    pub fn new(assignment: Assignment) -> Self {
        Self {
            assignment,
            tally: TallyState::default(),
            trusted: false,
        }
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn tally(&self) -> &TallyState {
        &self.tally
    }

    /// False while the link is down and no fresh tally has arrived
    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Apply an assignment; returns true if the stored assignment changed
    ///
    /// Any accepted assignment zeroes the tally bits, including one for the
    /// current source. The next tally broadcast sets them again.
    pub fn apply_assignment(&mut self, update: &AssignmentUpdate, now: Instant) -> bool {
        let next = match update {
            AssignmentUpdate::Assigned {
                source_id,
                source_name,
            } => {
                if source_id.is_empty() {
                    return false;
                }
                if source_id != self.assignment.source_id() {
                    info!("Assigned to {}", source_id);
                }
                self.tally = TallyState::cleared(now);
                Assignment::new(source_id.as_str(), source_name.as_str())
                    .with_display_name(self.assignment.display_name())
            }
            AssignmentUpdate::Unassigned => {
                if self.assignment.is_assigned() {
                    info!("Unassigned from {}", self.assignment.source_id());
                }
                self.tally = TallyState::cleared(now);
                Assignment::unassigned()
            }
        };

        let changed = next != self.assignment;
        self.assignment = next;
        self.check_invariant();
        changed
    }

    /// Apply a tally broadcast; returns true if it was for this node's source
    pub fn apply_tally(&mut self, update: &TallyUpdate, now: Instant) -> bool {
        if !self.assignment.is_assigned() || update.source_id != self.assignment.source_id() {
            return false;
        }

        let next = TallyState::new(
            update.program,
            update.preview,
            update.recording,
            update.streaming,
            now,
        );
        if !next.same_bits(&self.tally) {
            debug!(
                "Tally {} program={} preview={}",
                update.source_id, update.program, update.preview
            );
        }
        self.tally = next;
        self.trusted = true;
        self.check_invariant();
        true
    }

    /// Operator display-name override; returns true if it changed
    pub fn set_display_name(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name == self.assignment.display_name() {
            return false;
        }
        self.assignment = self.assignment.clone().with_display_name(name);
        true
    }

    /// Stored tally bits no longer reflect the hub
    pub fn link_lost(&mut self) {
        self.trusted = false;
    }

    pub fn link_restored(&mut self) {
        self.trusted = true;
    }

    fn check_invariant(&self) {
        debug_assert!(
            !self.tally.any() || self.assignment.is_assigned(),
            "tally bits set without an assignment"
        );
    }
}
