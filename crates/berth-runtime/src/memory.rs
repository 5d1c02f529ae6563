//! In-memory runtime cluster for testing.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

use crate::probe::{RuntimeConnection, RuntimeError, RuntimeProbe, RuntimeResult};
use crate::workload::{TransportSecurity, WorkloadId, WorkloadSpec, WorkloadSummary};

/// In-memory cluster of fake container daemons, keyed by address.
///
/// Exists for tests: daemons can be made unreachable, seeded with
/// workloads at chosen timestamps, and gated so that a configured number
/// of concurrent launches all pass their capacity checks before any of
/// them lands. Creation timestamps are strictly monotonic across the
/// whole cluster so ordering-based assertions are deterministic.
#[derive(Default)]
pub struct MemoryRuntime {
    daemons: DashMap<String, Arc<MemoryDaemon>>,
    clock: Arc<ClusterClock>,
    gate: Arc<Mutex<Option<Arc<LaunchGate>>>>,
}

impl MemoryRuntime {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reachable daemon at an address.
    pub fn add_daemon(&self, address: impl Into<String>) -> Arc<MemoryDaemon> {
        let address = address.into();
        let daemon = Arc::new(MemoryDaemon {
            address: address.clone(),
            reachable: AtomicBool::new(true),
            workloads: DashMap::new(),
            clock: self.clock.clone(),
        });
        self.daemons.insert(address, daemon.clone());
        daemon
    }

    /// Returns the daemon at an address, if one was added.
    pub fn daemon(&self, address: &str) -> Option<Arc<MemoryDaemon>> {
        self.daemons.get(address).map(|r| r.clone())
    }

    /// Holds the next `participants` launches at a barrier until all of
    /// them have arrived. Later launches pass through unimpeded.
    pub fn set_launch_gate(&self, participants: usize) {
        *self.gate.lock() = Some(Arc::new(LaunchGate {
            barrier: Barrier::new(participants),
            slots: AtomicUsize::new(participants),
        }));
    }
}

#[async_trait]
impl RuntimeProbe for MemoryRuntime {
    async fn connect(
        &self,
        address: &str,
        _security: Option<&TransportSecurity>,
    ) -> RuntimeResult<Arc<dyn RuntimeConnection>> {
        let daemon = self
            .daemons
            .get(address)
            .map(|r| r.clone())
            .ok_or_else(|| RuntimeError::Unreachable {
                address: address.to_string(),
                reason: "no daemon at address".to_string(),
            })?;

        if !daemon.reachable.load(Ordering::SeqCst) {
            return Err(RuntimeError::Unreachable {
                address: address.to_string(),
                reason: "daemon not responding".to_string(),
            });
        }

        let connection: Arc<dyn RuntimeConnection> = Arc::new(MemoryConnection {
            daemon,
            gate: self.gate.clone(),
        });
        Ok(connection)
    }
}

impl std::fmt::Debug for MemoryRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRuntime")
            .field("daemons", &self.daemons.len())
            .finish_non_exhaustive()
    }
}

/// One fake daemon.
pub struct MemoryDaemon {
    address: String,
    reachable: AtomicBool,
    workloads: DashMap<WorkloadId, StoredWorkload>,
    clock: Arc<ClusterClock>,
}

#[derive(Clone)]
struct StoredWorkload {
    label: String,
    created_at: DateTime<Utc>,
}

impl MemoryDaemon {
    /// Toggles whether connections and launches against this daemon
    /// succeed.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Seeds a running workload, returning its generated id.
    pub fn seed_workload(&self, label: &str) -> WorkloadId {
        let id = ulid::Ulid::new().to_string().to_lowercase();
        self.seed_workload_at(&id, label, self.clock.next());
        id
    }

    /// Seeds a running workload with an explicit id and creation time.
    pub fn seed_workload_at(&self, id: &str, label: &str, created_at: DateTime<Utc>) {
        self.workloads.insert(
            id.to_string(),
            StoredWorkload {
                label: label.to_string(),
                created_at,
            },
        );
    }

    /// Removes a workload, simulating it finishing externally.
    pub fn remove_workload(&self, id: &str) {
        self.workloads.remove(id);
    }

    /// Number of running workloads carrying the label.
    pub fn workload_count(&self, label: &str) -> usize {
        self.workloads
            .iter()
            .filter(|r| r.value().label == label)
            .count()
    }

    /// Ids of running workloads carrying the label, oldest first.
    pub fn workload_ids(&self, label: &str) -> Vec<WorkloadId> {
        let mut entries: Vec<(WorkloadId, DateTime<Utc>)> = self
            .workloads
            .iter()
            .filter(|r| r.value().label == label)
            .map(|r| (r.key().clone(), r.value().created_at))
            .collect();
        entries.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
        entries.into_iter().map(|(id, _)| id).collect()
    }
}

impl std::fmt::Debug for MemoryDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDaemon")
            .field("address", &self.address)
            .field("reachable", &self.reachable.load(Ordering::SeqCst))
            .field("workloads", &self.workloads.len())
            .finish()
    }
}

struct MemoryConnection {
    daemon: Arc<MemoryDaemon>,
    gate: Arc<Mutex<Option<Arc<LaunchGate>>>>,
}

#[async_trait]
impl RuntimeConnection for MemoryConnection {
    fn address(&self) -> &str {
        &self.daemon.address
    }

    async fn ping(&self) -> RuntimeResult<()> {
        if self.daemon.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RuntimeError::Unreachable {
                address: self.daemon.address.clone(),
                reason: "daemon not responding".to_string(),
            })
        }
    }

    async fn list_workloads(&self, label: &str) -> RuntimeResult<Vec<WorkloadSummary>> {
        self.ping().await?;
        Ok(self
            .daemon
            .workloads
            .iter()
            .filter(|r| r.value().label == label)
            .map(|r| WorkloadSummary {
                id: r.key().clone(),
                created_at: r.value().created_at,
            })
            .collect())
    }

    async fn launch(&self, _spec: &WorkloadSpec, label: &str) -> RuntimeResult<WorkloadSummary> {
        if !self.daemon.reachable.load(Ordering::SeqCst) {
            return Err(RuntimeError::LaunchFailed(format!(
                "daemon at {} not responding",
                self.daemon.address
            )));
        }

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            if gate.take_slot() {
                gate.barrier.wait().await;
            }
        }

        let id = ulid::Ulid::new().to_string().to_lowercase();
        let created_at = self.daemon.clock.next();
        self.daemon.workloads.insert(
            id.clone(),
            StoredWorkload {
                label: label.to_string(),
                created_at,
            },
        );
        Ok(WorkloadSummary { id, created_at })
    }

    async fn stop_workload(&self, id: &str) -> RuntimeResult<()> {
        self.daemon
            .workloads
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::WorkloadNotFound(id.to_string()))
    }
}

/// Strictly monotonic creation-time source shared by every daemon.
struct ClusterClock {
    base: DateTime<Utc>,
    seq: AtomicI64,
}

impl Default for ClusterClock {
    fn default() -> Self {
        Self {
            base: Utc::now(),
            seq: AtomicI64::new(0),
        }
    }
}

impl ClusterClock {
    fn next(&self) -> DateTime<Utc> {
        let tick = self.seq.fetch_add(1, Ordering::SeqCst);
        self.base + ChronoDuration::microseconds(tick)
    }
}

/// Barrier holding the first `slots` launches until all have arrived.
struct LaunchGate {
    barrier: Barrier,
    slots: AtomicUsize,
}

impl LaunchGate {
    fn take_slot(&self) -> bool {
        self.slots
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok()
    }
}
