//! In-memory pool provider for testing.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::filter::PoolFilter;
use crate::host::{HostId, HostRef, HostState};
use crate::provider::{PoolError, PoolProvider, PoolResult};

/// In-memory pool provider.
///
/// Holds a mutable set of hosts and counts start requests, so tests can
/// assert how a placement engine drove the pool. Not suitable for
/// production use; the pool exists only in this process.
#[derive(Debug, Default)]
pub struct MemoryPool {
    hosts: DashMap<HostId, HostRef>,
    start_counts: DashMap<HostId, u64>,
    wedged: DashMap<HostId, String>,
}

impl MemoryPool {
    /// Creates a new empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a host.
    pub fn insert(&self, host: HostRef) {
        self.hosts.insert(host.id.clone(), host);
    }

    /// Returns a host by id.
    pub fn get(&self, host: &str) -> Option<HostRef> {
        self.hosts.get(host).map(|r| r.clone())
    }

    /// Overrides a host's reported state.
    pub fn set_state(&self, host: &str, state: HostState) {
        if let Some(mut entry) = self.hosts.get_mut(host) {
            entry.state = state;
        }
    }

    /// Makes start requests for a host fail with the given reason.
    pub fn wedge(&self, host: &str, reason: impl Into<String>) {
        self.wedged.insert(host.to_string(), reason.into());
    }

    /// Number of start requests issued against a host.
    pub fn start_count(&self, host: &str) -> u64 {
        self.start_counts.get(host).map_or(0, |r| *r)
    }
}

#[async_trait]
impl PoolProvider for MemoryPool {
    async fn list(&self, filter: &PoolFilter) -> PoolResult<Vec<HostRef>> {
        Ok(self
            .hosts
            .iter()
            .map(|r| r.value().clone())
            .filter(|h| filter.matches(h))
            .collect())
    }

    async fn start(&self, host: &str) -> PoolResult<HostRef> {
        *self.start_counts.entry(host.to_string()).or_insert(0) += 1;

        if let Some(reason) = self.wedged.get(host) {
            return Err(PoolError::StartFailed {
                host: host.to_string(),
                reason: reason.value().clone(),
            });
        }

        let mut entry = self
            .hosts
            .get_mut(host)
            .ok_or_else(|| PoolError::HostNotFound(host.to_string()))?;

        entry.state = HostState::Running;
        entry.launched_at = Some(Utc::now());
        Ok(entry.clone())
    }
}
