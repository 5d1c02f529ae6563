//! Container runtime contract for Berth placement.
//!
//! A placement engine needs three things from the container runtime on a
//! host: a liveness probe, a count of the workloads it owns there, and a
//! way to launch (and if necessary stop) one more. This crate defines
//! that contract and two implementations:
//!
//! - [`DockerProbe`] speaks the Docker Engine HTTP API over TCP, with
//!   optional mutual TLS (ports 2375 plain / 2376 TLS by convention)
//! - [`MemoryRuntime`] is an in-memory cluster of fake daemons for tests
//!
//! Ownership is expressed through a label: every workload launched
//! through a connection carries it, and occupancy queries count only
//! workloads that carry it. Anything else running on the host is
//! invisible here by construction.

#![forbid(unsafe_code)]

pub mod docker;
pub mod memory;
pub mod probe;
pub mod workload;

pub use docker::DockerProbe;
pub use memory::{MemoryDaemon, MemoryRuntime};
pub use probe::{RuntimeConnection, RuntimeError, RuntimeProbe, RuntimeResult};
pub use workload::{LaunchSpec, TransportSecurity, WorkloadId, WorkloadSpec, WorkloadSummary};
