//! Event manager statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of event manager activity for monitoring.
///
/// # Examples
///
/// ```rust
/// # fn main() -> Result<(), rocket_events::EventError> {
/// let events = rocket_events::EventManager::new()?;
/// let stats = events.stats();
/// println!(
///     "{} subscriptions, {} events emitted",
///     stats.total_subscriptions, stats.events_emitted
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct EventManagerStats {
    /// Currently registered subscriptions
    pub total_subscriptions: usize,
    /// Currently registered listener objects
    pub total_listeners: usize,
    /// Total `emit` calls since the manager was created
    pub events_emitted: u64,
    /// Handler invocations that returned successfully
    pub handlers_invoked: u64,
    /// Handler invocations that returned an error or panicked
    pub handler_failures: u64,
    /// Matched handlers skipped because their owner had ended
    pub skipped_dead_owners: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    events_emitted: AtomicU64,
    handlers_invoked: AtomicU64,
    handler_failures: AtomicU64,
    skipped_dead_owners: AtomicU64,
}

impl DispatchCounters {
    pub(crate) fn record_emit(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.handlers_invoked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) {
        self.skipped_dead_owners.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        total_subscriptions: usize,
        total_listeners: usize,
    ) -> EventManagerStats {
        EventManagerStats {
            total_subscriptions,
            total_listeners,
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            handlers_invoked: self.handlers_invoked.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            skipped_dead_owners: self.skipped_dead_owners.load(Ordering::Relaxed),
        }
    }
}
