//! Observer hooks for notable placement events.

use berth_pool::HostId;
use std::time::Duration;

use crate::error::RetryReason;

/// Caller-supplied hooks invoked at notable points of a placement.
///
/// All methods default to no-ops; implement the ones you care about.
/// Hooks run synchronously inside the attempt, so they should be
/// cheap. The engine also emits `tracing` events for the same moments;
/// this trait is for callers that want to react, not just log.
pub trait PlacementObserver: Send + Sync {
    /// A host was selected for launch.
    fn host_selected(&self, _host: &HostId, _occupancy: u32, _capacity: u32) {}

    /// A stopped host was started.
    fn host_started(&self, _host: &HostId) {}

    /// Reconciliation found this placement's workload surplus and
    /// evicted it.
    fn race_detected(&self, _host: &HostId, _workload: &str) {}

    /// An attempt failed transiently and the engine is retrying.
    fn attempt_retried(&self, _attempt: u32, _reason: &RetryReason) {}

    /// The pool is saturated; the engine is sleeping before retrying.
    fn backing_off(&self, _duration: Duration) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PlacementObserver for NoopObserver {}
