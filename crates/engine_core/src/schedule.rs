//! Deferred, cancellable tasks driven by the frame clock.
//!
//! A task is queued together with a weak watch on its owner's [`LifetimeToken`].
//! Dropping the token (because the owner was despawned or replaced the token with
//! a newer one) silently cancels every task still bound to it.

use std::rc::{Rc, Weak};

/// Ownership marker for scheduled work. Clone-free on purpose: one owner, one token.
#[derive(Debug, Default)]
pub struct LifetimeToken(Rc<()>);

impl LifetimeToken {
    pub fn new() -> Self {
        Self(Rc::new(()))
    }

    fn watch(&self) -> Weak<()> {
        Rc::downgrade(&self.0)
    }
}

#[derive(Debug)]
struct Pending<T> {
    remaining: f32,
    owner: Weak<()>,
    task: T,
}

/// Frame-driven task queue.
#[derive(Debug)]
pub struct Scheduler<T> {
    pending: Vec<Pending<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Queue `task` to fire after `delay` seconds, as long as `owner` is still alive.
    pub fn schedule(&mut self, delay: f32, owner: &LifetimeToken, task: T) {
        self.pending.push(Pending {
            remaining: delay.max(0.0),
            owner: owner.watch(),
            task,
        });
    }

    /// Advance the clock and return the tasks that came due, in scheduling order.
    /// Tasks whose owner was dropped are discarded without being returned.
    pub fn advance(&mut self, dt: f32) -> Vec<T> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut due = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending.len());

        for mut entry in self.pending.drain(..) {
            if entry.owner.strong_count() == 0 {
                continue;
            }
            entry.remaining -= dt;
            if entry.remaining <= 0.0 {
                due.push(entry.task);
            } else {
                still_pending.push(entry);
            }
        }

        self.pending = still_pending;
        due
    }

    /// Number of tasks that are queued and still owned.
    pub fn pending(&self) -> usize {
        self.pending
            .iter()
            .filter(|entry| entry.owner.strong_count() > 0)
            .count()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
