//! The placement engine.

use berth_pool::{HostRef, PoolFilter, PoolProvider};
use berth_runtime::{
    RuntimeConnection, RuntimeProbe, TransportSecurity, WorkloadSpec, WorkloadSummary,
};
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::PlacerConfig;
use crate::error::{PlacerError, PlacerResult, RetryReason};
use crate::events::{NoopObserver, PlacementObserver};
use crate::select;
use crate::snapshot::{self, HostSnapshot};

/// Per-call placement options.
#[derive(Debug, Clone, Default)]
pub struct PlaceOptions {
    /// Metadata tag whose value overrides the default per-host
    /// capacity.
    pub capacity_tag: Option<String>,
    /// Mutual-TLS material for runtime connections.
    pub security: Option<TransportSecurity>,
}

/// A successful placement: the running workload plus the connection
/// that started it.
///
/// Ownership transfers to the caller at handoff; the engine will not
/// touch the workload again.
#[derive(Clone)]
pub struct Placement {
    /// The running workload.
    pub workload: WorkloadSummary,
    /// The host it landed on.
    pub host: HostRef,
    /// Live connection to that host's runtime.
    pub connection: Arc<dyn RuntimeConnection>,
}

impl Placement {
    /// Stops the placed workload.
    pub async fn stop(&self) -> berth_runtime::RuntimeResult<()> {
        self.connection.stop_workload(&self.workload.id).await
    }
}

impl std::fmt::Debug for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Placement")
            .field("workload", &self.workload.id)
            .field("host", &self.host.id)
            .finish_non_exhaustive()
    }
}

/// Outcome of one placement attempt.
enum Attempt {
    Placed(Placement),
    Retry(RetryReason),
}

/// Places workloads onto hosts from a shared pool.
///
/// Stateless between calls: every attempt re-enumerates the pool and
/// rebuilds its view from scratch, so concurrent engines in other
/// processes need no coordination beyond the reconciliation step.
pub struct PlacementEngine {
    config: PlacerConfig,
    pool: Arc<dyn PoolProvider>,
    probe: Arc<dyn RuntimeProbe>,
    observer: Arc<dyn PlacementObserver>,
    rng: Mutex<SmallRng>,
}

impl PlacementEngine {
    /// Creates an engine over a pool provider and runtime probe.
    pub fn new(
        config: PlacerConfig,
        pool: Arc<dyn PoolProvider>,
        probe: Arc<dyn RuntimeProbe>,
    ) -> Self {
        Self {
            config,
            pool,
            probe,
            observer: Arc::new(NoopObserver),
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Installs an observer for placement events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PlacementObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Seeds the tie-break and backoff randomness, pinning outcomes
    /// for tests.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(SmallRng::seed_from_u64(seed));
        self
    }

    /// Places a workload on a host drawn from the filtered pool.
    ///
    /// On success the workload is running on a host that, at
    /// verification time, had not exceeded its capacity. Each transient
    /// failure restarts the whole attempt from a fresh enumeration, up
    /// to the configured attempt cap.
    pub async fn place(
        &self,
        spec: &WorkloadSpec,
        filter: &PoolFilter,
        options: &PlaceOptions,
    ) -> PlacerResult<Placement> {
        let mut last = RetryReason::NoCapacity;
        for attempt in 1..=self.config.max_attempts {
            match self.attempt(spec, filter, options).await {
                Attempt::Placed(placement) => {
                    info!(
                        host = %placement.host.id,
                        workload = %placement.workload.id,
                        attempt,
                        "workload placed"
                    );
                    return Ok(placement);
                }
                Attempt::Retry(reason) => {
                    warn!(attempt, %reason, "placement attempt failed, retrying");
                    self.observer.attempt_retried(attempt, &reason);
                    last = reason;
                }
            }
        }

        Err(PlacerError::Exhausted {
            attempts: self.config.max_attempts,
            last,
        })
    }

    /// One pass: enumerate, select, launch, reconcile.
    async fn attempt(
        &self,
        spec: &WorkloadSpec,
        filter: &PoolFilter,
        options: &PlaceOptions,
    ) -> Attempt {
        let hosts = match self.pool.list(filter).await {
            Ok(hosts) => hosts,
            Err(e) => return Attempt::Retry(RetryReason::Pool(e.to_string())),
        };
        info!(hosts = hosts.len(), "pool enumerated");

        let mut snapshots = Vec::with_capacity(hosts.len());
        for host in hosts {
            let capacity = snapshot::effective_capacity(
                &host,
                options.capacity_tag.as_deref(),
                self.config.default_capacity,
            );
            snapshots.push(
                snapshot::observe(
                    self.probe.as_ref(),
                    host,
                    capacity,
                    &self.config.label,
                    self.config.boot_grace,
                    options.security.as_ref(),
                )
                .await,
            );
        }

        let selected = match self.choose(snapshots, options).await {
            Ok(selected) => selected,
            Err(reason) => return Attempt::Retry(reason),
        };
        self.observer
            .host_selected(&selected.host.id, selected.occupancy, selected.capacity);

        // Both selection paths guarantee a live connection.
        let Some(connection) = selected.connection.clone() else {
            return Attempt::Retry(RetryReason::RuntimeNotUp {
                host: selected.host.id.clone(),
            });
        };

        info!(host = %selected.host.id, image = %spec.image, "launching workload");
        let workload = match connection.launch(spec, &self.config.label).await {
            Ok(workload) => workload,
            // Never condemn the host for a failed launch; another
            // engine may simply have taken the slot first.
            Err(e) => {
                return Attempt::Retry(RetryReason::LaunchFailed {
                    host: selected.host.id.clone(),
                    reason: e.to_string(),
                })
            }
        };

        match self.reconcile(&connection, &selected, &workload).await {
            Ok(()) => Attempt::Placed(Placement {
                workload,
                host: selected.host,
                connection,
            }),
            Err(reason) => Attempt::Retry(reason),
        }
    }

    /// Applies the selection policy to the snapshots.
    ///
    /// Returns the chosen snapshot with a live connection, or the
    /// transient reason nothing was choosable.
    async fn choose(
        &self,
        mut snapshots: Vec<HostSnapshot>,
        options: &PlaceOptions,
    ) -> Result<HostSnapshot, RetryReason> {
        let candidates = select::least_occupied(&snapshots);
        if let Some(index) = {
            let mut rng = self.rng.lock();
            select::pick(&mut rng, &candidates)
        } {
            let selected = snapshots.swap_remove(index);
            info!(
                host = %selected.host.id,
                occupancy = selected.occupancy,
                capacity = selected.capacity,
                "selected running host"
            );
            return Ok(selected);
        }

        let stopped = select::stopped(&snapshots);
        let index = {
            let mut rng = self.rng.lock();
            select::pick(&mut rng, &stopped)
        };
        match index {
            Some(index) => self.wake(snapshots.swap_remove(index), options).await,
            None => {
                let backoff = {
                    let mut rng = self.rng.lock();
                    select::sample_backoff(&mut rng, self.config.backoff.min, self.config.backoff.max)
                };
                info!(backoff_ms = backoff.as_millis() as u64, "pool saturated, backing off");
                self.observer.backing_off(backoff);
                tokio::time::sleep(backoff).await;
                Err(RetryReason::NoCapacity)
            }
        }
    }

    /// Starts a stopped host and re-observes it once its boot grace
    /// has elapsed.
    async fn wake(
        &self,
        snapshot: HostSnapshot,
        options: &PlaceOptions,
    ) -> Result<HostSnapshot, RetryReason> {
        let host_id = snapshot.host.id.clone();
        info!(host = %host_id, "starting stopped host");

        let started = match self.pool.start(&host_id).await {
            Ok(started) => started,
            Err(e) => return Err(RetryReason::Pool(e.to_string())),
        };
        self.observer.host_started(&started.id);

        tokio::time::sleep(self.config.boot_grace).await;

        // Tags may have changed while the host was stopped; trust the
        // refreshed description over the pre-start one.
        let capacity = snapshot::effective_capacity(
            &started,
            options.capacity_tag.as_deref(),
            self.config.default_capacity,
        );
        let observed = snapshot::observe(
            self.probe.as_ref(),
            started,
            capacity,
            &self.config.label,
            // Grace already slept in full above.
            Duration::ZERO,
            options.security.as_ref(),
        )
        .await;

        if observed.connection.is_some() {
            Ok(observed)
        } else {
            // A host that will not come up gets no immediate second
            // chance; the picture may have changed, so re-enumerate.
            warn!(host = %host_id, "runtime still unreachable after boot grace");
            Err(RetryReason::RuntimeNotUp { host: host_id })
        }
    }

    /// Verifies the launch did not overshoot the host's capacity, and
    /// evicts our own workload if it did.
    async fn reconcile(
        &self,
        connection: &Arc<dyn RuntimeConnection>,
        selected: &HostSnapshot,
        ours: &WorkloadSummary,
    ) -> Result<(), RetryReason> {
        let host_id = &selected.host.id;
        let occupants = match connection.list_workloads(&self.config.label).await {
            Ok(occupants) => occupants,
            Err(e) => {
                return Err(RetryReason::Runtime {
                    host: host_id.clone(),
                    reason: e.to_string(),
                })
            }
        };

        if occupants.len() <= selected.capacity as usize {
            return Ok(());
        }

        // Over capacity: the newest arrivals are the ones that did not
        // fit. Yielding as the younger workload is fair under
        // concurrent placement because it never disturbs work already
        // in progress elsewhere.
        let surplus = select::surplus(&occupants, selected.capacity);
        if !surplus.contains(&ours.id) {
            return Ok(());
        }

        warn!(
            host = %host_id,
            workload = %ours.id,
            occupancy = occupants.len(),
            capacity = selected.capacity,
            "placement race detected, evicting our workload"
        );
        self.observer.race_detected(host_id, &ours.id);

        if let Err(e) = connection.stop_workload(&ours.id).await {
            // Another reconciler may have beaten us to the stop; the
            // retry below is correct either way.
            warn!(host = %host_id, workload = %ours.id, error = %e, "eviction stop failed");
        }

        Err(RetryReason::Evicted {
            host: host_id.clone(),
        })
    }
}

impl std::fmt::Debug for PlacementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementEngine")
            .field("label", &self.config.label)
            .field("default_capacity", &self.config.default_capacity)
            .field("max_attempts", &self.config.max_attempts)
            .finish_non_exhaustive()
    }
}
