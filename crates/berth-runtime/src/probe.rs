//! The runtime probe contract.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::workload::{TransportSecurity, WorkloadId, WorkloadSpec, WorkloadSummary};

/// Result type alias using [`RuntimeError`].
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors from the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The daemon at an address did not answer.
    #[error("runtime unreachable at {address}: {reason}")]
    Unreachable {
        /// Address that was probed.
        address: String,
        /// Underlying failure.
        reason: String,
    },

    /// The runtime rejected or failed a launch request.
    #[error("launch failed: {0}")]
    LaunchFailed(String),

    /// The named workload does not exist on this daemon.
    #[error("workload not found: {0}")]
    WorkloadNotFound(WorkloadId),

    /// TLS material could not be loaded.
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed runtime response.
    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

/// Trait for runtime probe implementations.
///
/// A probe turns a host address into a live [`RuntimeConnection`], or
/// fails if the daemon there does not answer.
#[async_trait]
pub trait RuntimeProbe: Send + Sync {
    /// Connects to the runtime at an address.
    async fn connect(
        &self,
        address: &str,
        security: Option<&TransportSecurity>,
    ) -> RuntimeResult<Arc<dyn RuntimeConnection>>;
}

/// A live connection to one host's container runtime.
#[async_trait]
pub trait RuntimeConnection: Send + Sync {
    /// Address this connection talks to.
    fn address(&self) -> &str;

    /// Verifies the daemon is answering.
    async fn ping(&self) -> RuntimeResult<()>;

    /// Lists running workloads carrying the ownership label.
    async fn list_workloads(&self, label: &str) -> RuntimeResult<Vec<WorkloadSummary>>;

    /// Launches a workload tagged with the ownership label.
    async fn launch(&self, spec: &WorkloadSpec, label: &str) -> RuntimeResult<WorkloadSummary>;

    /// Stops a running workload.
    async fn stop_workload(&self, id: &str) -> RuntimeResult<()>;
}
