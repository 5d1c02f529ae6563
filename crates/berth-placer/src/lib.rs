//! Berth placement engine - decentralized admission control for
//! container hosts.
//!
//! The engine places one workload onto one host drawn from a shared,
//! finite pool, with no central coordinator and no lock service. Many
//! independent engines may place against the same pool concurrently;
//! every decision rests on eventually-consistent observations (host
//! state, daemon reachability, per-host occupancy counts), so the
//! engine is built to decide optimistically, detect violations after
//! the fact, and self-correct.
//!
//! One attempt:
//!
//! - **Enumerate**: list the pool under a filter, snapshot every host
//!   fresh (effective capacity, reachability, labeled occupancy)
//! - **Select**: least-occupied running host with room, random
//!   tie-break; else wake a random stopped host; else back off for a
//!   randomized window so waiting engines desynchronize
//! - **Launch**: start the workload on the selected host, tagged with
//!   the ownership label
//! - **Reconcile**: re-count occupancy; if the host overshot, the
//!   newest workloads are surplus, and if ours is among them we stop
//!   it and retry
//!
//! A bounded retry loop wraps the attempt; only the transient signal
//! retries, and exhaustion is the single fatal error.
//!
//! # Example
//!
//! ```ignore
//! use berth_placer::{PlaceOptions, PlacementEngine, PlacerConfig};
//! use berth_pool::PoolFilter;
//! use berth_runtime::{DockerProbe, WorkloadSpec};
//!
//! let engine = PlacementEngine::new(PlacerConfig::default(), pool, Arc::new(DockerProbe::new()));
//! let placement = engine
//!     .place(
//!         &WorkloadSpec::new("adamrehn/ue4-full:4.21.2"),
//!         &PoolFilter::tag("ci-platform", ["linux"]),
//!         &PlaceOptions::default(),
//!     )
//!     .await?;
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod select;
pub mod snapshot;

pub use config::{BackoffConfig, PlacerConfig};
pub use engine::{PlaceOptions, Placement, PlacementEngine};
pub use error::{PlacerError, PlacerResult, RetryReason};
pub use events::{NoopObserver, PlacementObserver};
pub use snapshot::HostSnapshot;
