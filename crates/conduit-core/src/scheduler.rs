//! Delayed actions keyed by mover.
//!
//! The registry never polls movers to see whether they have arrived. Instead
//! it registers an [`ActionTag::Arrival`] with a [`Scheduler`] when a route is
//! assigned and reacts when the scheduler reports the action as fired.
//! [`DelayQueue`] is the reference implementation.

use crate::clock::Ticks;
use crate::id::MoverId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// What a delayed action means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionTag {
    /// The mover reached the end of its route.
    Arrival,
}

/// A delayed action whose deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredAction {
    pub subject: MoverId,
    pub action: ActionTag,
    /// The deadline the action was scheduled for.
    pub due: Ticks,
}

/// Fire-at-time registry. At most one action per `(subject, action)` key.
pub trait Scheduler {
    /// Schedule `action` for `subject` at absolute tick `at`, replacing any
    /// earlier schedule under the same key.
    fn schedule_at(&mut self, subject: MoverId, action: ActionTag, at: Ticks);

    /// Cancel a scheduled action. Cancelling an already-fired or
    /// already-cancelled action is a no-op.
    fn cancel(&mut self, subject: MoverId, action: ActionTag);

    /// The pending deadline for a key, if any.
    fn deadline(&self, subject: MoverId, action: ActionTag) -> Option<Ticks>;

    /// Remove and return every action due at or before `now`, earliest
    /// first. Each action is returned exactly once.
    fn drain_due(&mut self, now: Ticks) -> Vec<FiredAction>;
}

/// Reference scheduler: a deadline-ordered queue with a key index for O(log n)
/// cancellation.
#[derive(Debug, Default)]
pub struct DelayQueue {
    by_deadline: BTreeMap<Ticks, Vec<(MoverId, ActionTag)>>,
    deadlines: HashMap<(MoverId, ActionTag), Ticks>,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Ticks> {
        self.by_deadline.keys().next().copied()
    }
}

impl Scheduler for DelayQueue {
    fn schedule_at(&mut self, subject: MoverId, action: ActionTag, at: Ticks) {
        self.cancel(subject, action);
        self.by_deadline.entry(at).or_default().push((subject, action));
        self.deadlines.insert((subject, action), at);
    }

    fn cancel(&mut self, subject: MoverId, action: ActionTag) {
        let Some(at) = self.deadlines.remove(&(subject, action)) else {
            return;
        };
        if let Some(keys) = self.by_deadline.get_mut(&at) {
            keys.retain(|key| *key != (subject, action));
            if keys.is_empty() {
                self.by_deadline.remove(&at);
            }
        }
    }

    fn deadline(&self, subject: MoverId, action: ActionTag) -> Option<Ticks> {
        self.deadlines.get(&(subject, action)).copied()
    }

    fn drain_due(&mut self, now: Ticks) -> Vec<FiredAction> {
        let due = match now.checked_add(1) {
            Some(after) => {
                let later = self.by_deadline.split_off(&after);
                std::mem::replace(&mut self.by_deadline, later)
            }
            None => std::mem::take(&mut self.by_deadline),
        };

        let mut fired = Vec::new();
        for (at, keys) in due {
            for (subject, action) in keys {
                self.deadlines.remove(&(subject, action));
                fired.push(FiredAction {
                    subject,
                    action,
                    due: at,
                });
            }
        }
        fired
    }
}
