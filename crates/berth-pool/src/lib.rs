//! Host pool contract for Berth placement.
//!
//! A pool is the set of machines a placement engine may put work on,
//! visible under a filter at a point in time. This crate defines the
//! collaborator contract the engine consumes:
//!
//! - **Host inventory**: [`HostRef`] describes one machine as the
//!   provider last reported it (address, launch time, tags, state)
//! - **Filtering**: [`PoolFilter`] selects the candidate subset by
//!   tag match, or passes everything through
//! - **Lifecycle**: [`PoolProvider`] lists the pool and starts stopped
//!   hosts, blocking until the provider reports them running
//!
//! The pool view is always potentially stale: hosts start and stop
//! asynchronously, and nothing here caches across calls. Consumers are
//! expected to re-list on every decision and tolerate the picture
//! having changed underneath them.
//!
//! [`MemoryPool`] is an in-memory provider for tests and embedding.

#![forbid(unsafe_code)]

pub mod filter;
pub mod host;
pub mod memory;
pub mod provider;

pub use filter::PoolFilter;
pub use host::{HostId, HostRef, HostState};
pub use memory::MemoryPool;
pub use provider::{PoolError, PoolProvider, PoolResult};
