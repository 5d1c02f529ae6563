//! Common test utilities for placement integration tests.

pub mod fixtures;

use berth_placer::{BackoffConfig, PlacementEngine, PlacerConfig};
use berth_pool::{HostRef, MemoryPool};
use berth_runtime::{MemoryDaemon, MemoryRuntime};
use std::sync::Arc;
use std::time::Duration;

/// Ownership label used throughout the integration tests.
pub const LABEL: &str = "berth.test";

/// A pool provider and runtime cluster wired together, shared by any
/// number of engines.
pub struct TestCluster {
    pub pool: Arc<MemoryPool>,
    pub runtime: Arc<MemoryRuntime>,
}

impl TestCluster {
    /// Creates an empty cluster.
    pub fn new() -> Self {
        Self {
            pool: Arc::new(MemoryPool::new()),
            runtime: Arc::new(MemoryRuntime::new()),
        }
    }

    /// Builds an engine over this cluster.
    pub fn engine(&self, config: PlacerConfig) -> PlacementEngine {
        PlacementEngine::new(config, self.pool.clone(), self.runtime.clone())
    }

    /// Installs a host in the pool and a reachable daemon at its
    /// address.
    pub fn install(&self, host: HostRef) -> Arc<MemoryDaemon> {
        let address = host
            .public_address
            .clone()
            .expect("test hosts always carry an address");
        self.pool.insert(host);
        self.runtime.add_daemon(address)
    }
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration with no boot grace and millisecond backoffs, so tests
/// exercising the retry loop stay fast.
pub fn fast_config() -> PlacerConfig {
    PlacerConfig {
        label: LABEL.to_string(),
        default_capacity: 1,
        boot_grace: Duration::ZERO,
        backoff: BackoffConfig {
            min: Duration::from_millis(1),
            max: Duration::from_millis(5),
        },
        max_attempts: 5,
    }
}
