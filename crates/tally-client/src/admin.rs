//! Operator notices pushed by the hub

use std::time::{Duration, Instant};
use tally_core::AdminNotice;
use tracing::{debug, info};

/// A notice currently on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveNotice {
    pub notice: AdminNotice,
    pub shown_at: Instant,
    pub expires_at: Instant,
}

impl ActiveNotice {
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Holds at most one notice; a newer notice replaces the current one
#[derive(Debug, Clone)]
pub struct AdminBoard {
    default_duration: Duration,
    current: Option<ActiveNotice>,
}

impl AdminBoard {
    pub fn new(default_duration: Duration) -> Self {
        Self {
            default_duration,
            current: None,
        }
    }

    pub fn show(&mut self, notice: AdminNotice, now: Instant) {
        let duration = notice
            .duration
            .filter(|d| !d.is_zero())
            .unwrap_or(self.default_duration);
        info!("Admin notice for {:?}: {}", duration, notice.text);
        self.current = Some(ActiveNotice {
            notice,
            shown_at: now,
            expires_at: now + duration,
        });
    }

    /// Drop the notice once its time is up; returns true if one expired
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.current {
            Some(active) if now >= active.expires_at => {
                debug!("Admin notice expired");
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&ActiveNotice> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(duration: Option<Duration>) -> AdminNotice {
        AdminNotice {
            id: Some("n1".to_string()),
            text: "Stand by".to_string(),
            color: None,
            duration,
        }
    }

    #[test]
    fn test_default_duration() {
        let t0 = Instant::now();
        let mut board = AdminBoard::new(Duration::from_secs(10));
        board.show(notice(None), t0);

        assert!(!board.expire(t0 + Duration::from_secs(9)));
        assert!(board.expire(t0 + Duration::from_secs(10)));
        assert!(board.current().is_none());
    }

    #[test]
    fn test_explicit_duration_and_replace() {
        let t0 = Instant::now();
        let mut board = AdminBoard::new(Duration::from_secs(10));
        board.show(notice(Some(Duration::from_secs(3))), t0);
        assert_eq!(board.current().unwrap().remaining(t0), Duration::from_secs(3));

        board.show(notice(Some(Duration::from_secs(20))), t0 + Duration::from_secs(1));
        assert!(!board.expire(t0 + Duration::from_secs(5)));
    }
}
