//! Echo suppression
//!
//! When the bridge applies a command that came from the network, the player
//! reports the change back as if the user had made it locally. Forwarding that
//! report would bounce it around the relay forever. Before issuing a command
//! the network loop arms the slot for its kind; the player loop consumes the
//! slot when the matching notification arrives and drops that one event.
//!
//! Each slot holds at most one pending echo. A slot that is never consumed
//! lapses after a deadline so a command the player ignored cannot swallow the
//! next genuine local event.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

/// The two independent kinds of playback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Seek,
    Pause,
}

/// What the player loop should do with an observed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Self-inflicted. Do not forward.
    Suppress,
    /// A genuine local event. Forward it.
    Forward,
}

#[derive(Debug, Default)]
struct Slot {
    deadline: Mutex<Option<Instant>>,
}

impl Slot {
    fn arm(&self, deadline: Instant) {
        *self.deadline.lock().unwrap_or_else(|e| e.into_inner()) = Some(deadline);
    }

    fn take(&self) -> Option<Instant> {
        self.deadline
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn is_armed(&self) -> bool {
        self.deadline
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

/// Pending-echo state shared by a bridge's two loops.
#[derive(Debug)]
pub struct Suppressor {
    seek: Slot,
    pause: Slot,
    timeout: Duration,
}

impl Suppressor {
    pub fn new(timeout: Duration) -> Suppressor {
        Suppressor {
            seek: Slot::default(),
            pause: Slot::default(),
            timeout,
        }
    }

    fn slot(&self, kind: EventKind) -> &Slot {
        match kind {
            EventKind::Seek => &self.seek,
            EventKind::Pause => &self.pause,
        }
    }

    /// Mark that the next `kind` event from the player is our own echo.
    ///
    /// Arming an already armed slot refreshes its deadline; it still only
    /// suppresses one event.
    pub fn arm(&self, kind: EventKind) {
        self.arm_at(kind, Instant::now());
    }

    /// Decide whether an observed `kind` event should be forwarded, clearing
    /// the slot if it was armed.
    pub fn observe(&self, kind: EventKind) -> Verdict {
        self.observe_at(kind, Instant::now())
    }

    pub fn is_pending(&self, kind: EventKind) -> bool {
        self.slot(kind).is_armed()
    }

    fn arm_at(&self, kind: EventKind, now: Instant) {
        self.slot(kind).arm(now + self.timeout);
    }

    fn observe_at(&self, kind: EventKind, now: Instant) -> Verdict {
        match self.slot(kind).take() {
            None => Verdict::Forward,
            Some(deadline) if now <= deadline => Verdict::Suppress,
            Some(deadline) => {
                warn!(
                    ?kind,
                    late_by = ?now.duration_since(deadline),
                    "pending echo lapsed, forwarding event"
                );
                Verdict::Forward
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_slots_forward() {
        let suppressor = Suppressor::new(Duration::from_secs(5));
        assert_eq!(suppressor.observe(EventKind::Pause), Verdict::Forward);
        assert_eq!(suppressor.observe(EventKind::Seek), Verdict::Forward);
    }

    #[test]
    fn an_armed_slot_suppresses_exactly_once() {
        let suppressor = Suppressor::new(Duration::from_secs(5));
        suppressor.arm(EventKind::Pause);
        assert!(suppressor.is_pending(EventKind::Pause));

        assert_eq!(suppressor.observe(EventKind::Pause), Verdict::Suppress);
        assert!(!suppressor.is_pending(EventKind::Pause));
        assert_eq!(suppressor.observe(EventKind::Pause), Verdict::Forward);
    }

    #[test]
    fn kinds_do_not_interact() {
        let suppressor = Suppressor::new(Duration::from_secs(5));
        suppressor.arm(EventKind::Seek);

        assert_eq!(suppressor.observe(EventKind::Pause), Verdict::Forward);
        assert!(suppressor.is_pending(EventKind::Seek));
        assert_eq!(suppressor.observe(EventKind::Seek), Verdict::Suppress);
    }

    #[test]
    fn arming_twice_still_suppresses_one_event() {
        let suppressor = Suppressor::new(Duration::from_secs(5));
        suppressor.arm(EventKind::Seek);
        suppressor.arm(EventKind::Seek);

        assert_eq!(suppressor.observe(EventKind::Seek), Verdict::Suppress);
        assert_eq!(suppressor.observe(EventKind::Seek), Verdict::Forward);
    }

    #[test]
    fn a_lapsed_slot_forwards_and_clears() {
        let suppressor = Suppressor::new(Duration::from_millis(100));
        let start = Instant::now();
        suppressor.arm_at(EventKind::Pause, start);

        let later = start + Duration::from_millis(101);
        assert_eq!(
            suppressor.observe_at(EventKind::Pause, later),
            Verdict::Forward
        );
        assert!(!suppressor.is_pending(EventKind::Pause));
    }

    #[test]
    fn the_deadline_itself_still_suppresses() {
        let suppressor = Suppressor::new(Duration::from_millis(100));
        let start = Instant::now();
        suppressor.arm_at(EventKind::Seek, start);

        let at_deadline = start + Duration::from_millis(100);
        assert_eq!(
            suppressor.observe_at(EventKind::Seek, at_deadline),
            Verdict::Suppress
        );
    }
}
