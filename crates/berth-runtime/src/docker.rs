//! Docker Engine HTTP API implementation of the runtime contract.
//!
//! Talks to `dockerd` over TCP: plain HTTP on port 2375, mutual TLS on
//! 2376. An address may carry an explicit port, otherwise the
//! conventional one for the transport is appended.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Certificate, Client, Identity, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::probe::{RuntimeConnection, RuntimeError, RuntimeProbe, RuntimeResult};
use crate::workload::{TransportSecurity, WorkloadSpec, WorkloadSummary};

const PLAIN_PORT: u16 = 2375;
const TLS_PORT: u16 = 2376;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Probe that connects to Docker daemons over TCP.
#[derive(Debug, Clone, Default)]
pub struct DockerProbe;

impl DockerProbe {
    /// Creates a new probe.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RuntimeProbe for DockerProbe {
    async fn connect(
        &self,
        address: &str,
        security: Option<&TransportSecurity>,
    ) -> RuntimeResult<Arc<dyn RuntimeConnection>> {
        let mut builder = Client::builder().timeout(REQUEST_TIMEOUT);

        if let Some(security) = security {
            let ca = Certificate::from_pem(&security.ca_pem)
                .map_err(|e| RuntimeError::Tls(e.to_string()))?;
            let identity = Identity::from_pem(&security.identity_pem())
                .map_err(|e| RuntimeError::Tls(e.to_string()))?;
            builder = builder.add_root_certificate(ca).identity(identity);
        }

        let client = builder.build()?;
        let base_url = base_url(address, security.is_some());
        debug!(address, %base_url, "connecting to Docker daemon");

        let connection: Arc<dyn RuntimeConnection> = Arc::new(DockerConnection {
            client,
            base_url,
            address: address.to_string(),
        });
        Ok(connection)
    }
}

/// A connection to one Docker daemon.
pub struct DockerConnection {
    client: Client,
    base_url: String,
    address: String,
}

#[derive(Deserialize)]
struct ContainerListItem {
    #[serde(rename = "Id")]
    id: String,
    /// Unix timestamp in the list endpoint.
    #[serde(rename = "Created")]
    created: i64,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Deserialize)]
struct InspectResponse {
    /// RFC 3339 timestamp in the inspect endpoint.
    #[serde(rename = "Created")]
    created: DateTime<Utc>,
}

#[async_trait]
impl RuntimeConnection for DockerConnection {
    fn address(&self) -> &str {
        &self.address
    }

    async fn ping(&self) -> RuntimeResult<()> {
        let url = format!("{}/_ping", self.base_url);
        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| RuntimeError::Unreachable {
                    address: self.address.clone(),
                    reason: e.to_string(),
                })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RuntimeError::Unreachable {
                address: self.address.clone(),
                reason: format!("ping returned {}", response.status()),
            })
        }
    }

    async fn list_workloads(&self, label: &str) -> RuntimeResult<Vec<WorkloadSummary>> {
        let url = format!("{}/containers/json", self.base_url);
        let filters = json!({ "label": [label] }).to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("filters", filters.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let containers: Vec<ContainerListItem> = response.json().await?;
        Ok(containers
            .into_iter()
            .map(|c| WorkloadSummary {
                id: c.id,
                created_at: DateTime::from_timestamp(c.created, 0).unwrap_or(DateTime::UNIX_EPOCH),
            })
            .collect())
    }

    async fn launch(&self, spec: &WorkloadSpec, label: &str) -> RuntimeResult<WorkloadSummary> {
        let url = format!("{}/containers/create", self.base_url);
        let body = create_body(spec, label);

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RuntimeError::LaunchFailed(format!(
                "create returned {status}: {detail}"
            )));
        }
        let created: CreateResponse = response.json().await?;

        let start_url = format!("{}/containers/{}/start", self.base_url, created.id);
        let response = self.client.post(&start_url).send().await?;
        // 304 means the container was already running.
        if !response.status().is_success() && response.status() != StatusCode::NOT_MODIFIED {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RuntimeError::LaunchFailed(format!(
                "start returned {status}: {detail}"
            )));
        }

        let inspect_url = format!("{}/containers/{}/json", self.base_url, created.id);
        let inspected: InspectResponse = self
            .client
            .get(&inspect_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(id = %created.id, "container launched");
        Ok(WorkloadSummary {
            id: created.id,
            created_at: inspected.created,
        })
    }

    async fn stop_workload(&self, id: &str) -> RuntimeResult<()> {
        let url = format!("{}/containers/{}/stop", self.base_url, id);
        let response = self.client.post(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RuntimeError::WorkloadNotFound(id.to_string())),
            // 304 means the container had already stopped.
            status if status.is_success() || status == StatusCode::NOT_MODIFIED => Ok(()),
            status => {
                let detail = response.text().await.unwrap_or_default();
                Err(RuntimeError::Unreachable {
                    address: self.address.clone(),
                    reason: format!("stop returned {status}: {detail}"),
                })
            }
        }
    }
}

impl std::fmt::Debug for DockerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerConnection")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Builds the daemon base URL for an address, appending the
/// conventional port when the address has none.
fn base_url(address: &str, tls: bool) -> String {
    let scheme = if tls { "https" } else { "http" };
    if address.contains(':') {
        format!("{scheme}://{address}")
    } else {
        let port = if tls { TLS_PORT } else { PLAIN_PORT };
        format!("{scheme}://{address}:{port}")
    }
}

/// Builds the container-create request body.
fn create_body(spec: &WorkloadSpec, label: &str) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert("Image".to_string(), json!(spec.image));
    body.insert("Labels".to_string(), json!({ label: "" }));

    let launch = &spec.launch;
    if let Some(command) = &launch.command {
        body.insert("Cmd".to_string(), json!(command));
    }
    if !launch.env.is_empty() {
        let env: Vec<String> = launch.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        body.insert("Env".to_string(), json!(env));
    }

    let mut host_config = serde_json::Map::new();
    if !launch.binds.is_empty() {
        host_config.insert("Binds".to_string(), json!(launch.binds));
    }
    if let Some(mode) = &launch.network_mode {
        host_config.insert("NetworkMode".to_string(), json!(mode));
    }
    if let Some(limit_mb) = launch.memory_limit_mb {
        host_config.insert("Memory".to_string(), json!(limit_mb * 1024 * 1024));
    }
    if launch.privileged {
        host_config.insert("Privileged".to_string(), json!(true));
    }
    if !host_config.is_empty() {
        body.insert("HostConfig".to_string(), host_config.into());
    }

    for (key, value) in &launch.extra {
        body.insert(key.clone(), value.clone());
    }

    body.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_appends_conventional_ports() {
        assert_eq!(base_url("10.0.0.1", false), "http://10.0.0.1:2375");
        assert_eq!(base_url("10.0.0.1", true), "https://10.0.0.1:2376");
        assert_eq!(base_url("10.0.0.1:4243", false), "http://10.0.0.1:4243");
    }

    #[test]
    fn create_body_includes_label_and_typed_options() {
        let mut spec = WorkloadSpec::new("adamrehn/ue4-full:4.21.2");
        spec.launch.command = Some(vec!["sleep".to_string(), "infinity".to_string()]);
        spec.launch
            .env
            .insert("CI".to_string(), "true".to_string());
        spec.launch.memory_limit_mb = Some(512);
        spec.launch.network_mode = Some("host".to_string());

        let body = create_body(&spec, "io.berth.workload");

        assert_eq!(body["Image"], "adamrehn/ue4-full:4.21.2");
        assert_eq!(body["Labels"]["io.berth.workload"], "");
        assert_eq!(body["Cmd"][0], "sleep");
        assert_eq!(body["Env"][0], "CI=true");
        assert_eq!(body["HostConfig"]["Memory"], 512 * 1024 * 1024);
        assert_eq!(body["HostConfig"]["NetworkMode"], "host");
    }

    #[test]
    fn create_body_forwards_extra_fields_verbatim() {
        let mut spec = WorkloadSpec::new("busybox");
        spec.launch
            .extra
            .insert("Tty".to_string(), json!(true));

        let body = create_body(&spec, "io.berth.workload");
        assert_eq!(body["Tty"], true);
    }

    #[test]
    fn create_body_omits_empty_host_config() {
        let spec = WorkloadSpec::new("busybox");
        let body = create_body(&spec, "io.berth.workload");
        assert!(body.get("HostConfig").is_none());
        assert!(body.get("Cmd").is_none());
    }
}
