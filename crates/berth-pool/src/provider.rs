//! The pool provider contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::filter::PoolFilter;
use crate::host::{HostId, HostRef};

/// Result type alias using [`PoolError`].
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors from a pool provider.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The named host is not in the pool.
    #[error("host not found: {0}")]
    HostNotFound(HostId),

    /// A start request failed or the host never reached running.
    #[error("failed to start host {host}: {reason}")]
    StartFailed {
        /// Host that was being started.
        host: HostId,
        /// Provider-reported failure.
        reason: String,
    },

    /// Any other provider-side failure.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Trait for host pool backends.
///
/// Implementations wrap whatever inventory API owns the machines. Both
/// operations are point-in-time: a listed host may have changed state by
/// the time the caller acts on it.
#[async_trait]
pub trait PoolProvider: Send + Sync {
    /// Lists the hosts visible under the filter.
    async fn list(&self, filter: &PoolFilter) -> PoolResult<Vec<HostRef>>;

    /// Starts a stopped host, blocking until the provider reports it
    /// running. Returns the refreshed host description.
    async fn start(&self, host: &str) -> PoolResult<HostRef>;
}
