//! Timer wheel: scheduled callbacks at monotonic deadlines.
//!
//! The wheel itself is a pure data structure — it has no opinion on how the
//! embedding event loop is woken up for an expired deadline. [`crate::source`]
//! wires one `calloop::timer::Timer` per device (and one for the seat-wide
//! tap timers) so the fd becomes readable the way spec §5 describes: "one
//! per device plus one per timer".
//!
//! Re-entrancy: a fired timer's callback may arm new timers — including one
//! for the same logical deadline on the next call — but per spec §9 it must
//! never be re-entered for the instant that just fired. [`TimerWheel::expire`]
//! therefore drains every timer due at or before `now_ms` into a `Vec` up
//! front; the caller processes that queue after `expire` has returned,
//! rather than the wheel invoking callbacks itself mid-iteration.

use std::collections::{BTreeMap, HashMap};

/// Identifies one armed timer. Typically one per device (tap FSM) or one
/// per seat-wide concern (scroll-on-button deadline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// A min-ordered timer wheel keyed on deadline, generic over the payload
/// delivered when a timer fires.
#[derive(Debug, Default)]
pub struct TimerWheel<T> {
    // (deadline_ms, id) -> payload; BTreeMap gives us cheap "everything due
    // by now" range removal without scanning.
    by_deadline: BTreeMap<(u64, TimerId), T>,
    by_id: HashMap<TimerId, u64>,
}

impl<T> TimerWheel<T> {
    pub fn new() -> Self {
        TimerWheel {
            by_deadline: BTreeMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// Arm (or re-arm) `id` to fire at `deadline_ms`, carrying `payload`.
    /// Re-arming an existing id replaces its previous deadline and payload.
    pub fn arm(&mut self, id: TimerId, deadline_ms: u64, payload: T) {
        self.cancel(id);
        self.by_deadline.insert((deadline_ms, id), payload);
        self.by_id.insert(id, deadline_ms);
    }

    /// Cancel `id`. A no-op if it was not armed (or already fired).
    pub fn cancel(&mut self, id: TimerId) {
        if let Some(deadline) = self.by_id.remove(&id) {
            self.by_deadline.remove(&(deadline, id));
        }
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// The soonest deadline among armed timers, if any — what the embedder
    /// should use to size its next poll timeout.
    pub fn next_deadline(&self) -> Option<u64> {
        self.by_deadline.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every timer due at or before `now_ms`, ordered by
    /// deadline. Cancels their bookkeeping atomically with removal so a
    /// fired timer is not "still armed" from the caller's point of view.
    pub fn expire(&mut self, now_ms: u64) -> Vec<(TimerId, T)> {
        let due: Vec<(u64, TimerId)> = self
            .by_deadline
            .range(..=(now_ms, TimerId(u64::MAX)))
            .map(|(key, _)| *key)
            .collect();

        let mut fired = Vec::with_capacity(due.len());
        for key in due {
            if let Some(payload) = self.by_deadline.remove(&key) {
                self.by_id.remove(&key.1);
                fired.push((key.1, payload));
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_drains_due_timers_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        wheel.arm(TimerId(1), 200, "b");
        wheel.arm(TimerId(2), 100, "a");
        wheel.arm(TimerId(3), 500, "c");

        let fired = wheel.expire(200);
        assert_eq!(fired, vec![(TimerId(2), "a"), (TimerId(1), "b")]);
        assert!(wheel.is_armed(TimerId(3)));
        assert!(!wheel.is_armed(TimerId(1)));
    }

    #[test]
    fn cancel_is_noop_if_not_armed() {
        let mut wheel: TimerWheel<()> = TimerWheel::new();
        wheel.cancel(TimerId(9));
        assert!(!wheel.is_armed(TimerId(9)));
    }

    #[test]
    fn rearming_replaces_deadline() {
        let mut wheel = TimerWheel::new();
        wheel.arm(TimerId(1), 100, "first");
        wheel.arm(TimerId(1), 300, "second");
        assert!(wheel.expire(100).is_empty());
        assert_eq!(wheel.expire(300), vec![(TimerId(1), "second")]);
    }
}
