//! Workload descriptions and launch configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique workload identifier, assigned by the runtime.
pub type WorkloadId = String;

/// A workload as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSummary {
    /// Runtime-assigned identifier.
    pub id: WorkloadId,
    /// Creation timestamp, used for ordering during reconciliation.
    pub created_at: DateTime<Utc>,
}

/// What to run: an image plus launch configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Container image reference.
    pub image: String,
    /// Launch configuration forwarded to the runtime.
    #[serde(default)]
    pub launch: LaunchSpec,
}

impl WorkloadSpec {
    /// Creates a spec for an image with default launch configuration.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            launch: LaunchSpec::default(),
        }
    }
}

/// Launch configuration.
///
/// The recognised options are typed; `extra` is forwarded verbatim into
/// the runtime's create request for anything the runtime accepts that is
/// not modelled here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSpec {
    /// Command override.
    pub command: Option<Vec<String>>,
    /// Environment variables.
    pub env: BTreeMap<String, String>,
    /// Host path bindings in `host:container` form.
    pub binds: Vec<String>,
    /// Network mode (e.g. `bridge`, `host`).
    pub network_mode: Option<String>,
    /// Memory limit in megabytes.
    pub memory_limit_mb: Option<u64>,
    /// Run with elevated privileges.
    pub privileged: bool,
    /// Additional top-level create-request fields, forwarded verbatim.
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Mutual-TLS material for the runtime connection.
///
/// Where this comes from (and how it was decrypted) is the caller's
/// concern; the probe only consumes PEM bytes.
#[derive(Clone)]
pub struct TransportSecurity {
    /// CA certificate, PEM encoded.
    pub ca_pem: Vec<u8>,
    /// Client certificate, PEM encoded.
    pub client_cert_pem: Vec<u8>,
    /// Client private key, PEM encoded.
    pub client_key_pem: Vec<u8>,
}

impl TransportSecurity {
    /// Client certificate and key concatenated into one PEM blob, the
    /// form TLS identity builders expect.
    #[must_use]
    pub fn identity_pem(&self) -> Vec<u8> {
        let mut pem = self.client_key_pem.clone();
        pem.extend_from_slice(&self.client_cert_pem);
        pem
    }
}

impl std::fmt::Debug for TransportSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("TransportSecurity").finish_non_exhaustive()
    }
}
