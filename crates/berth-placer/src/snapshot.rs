//! Per-attempt host observations.
//!
//! A snapshot is built fresh for every host on every attempt and
//! discarded when the attempt ends. Staleness is bounded by the time
//! between attempts, never by a cache.

use berth_pool::HostRef;
use berth_runtime::{RuntimeConnection, RuntimeProbe, TransportSecurity};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One host as observed for one attempt.
pub struct HostSnapshot {
    /// The host as the pool provider reported it.
    pub host: HostRef,
    /// Effective capacity: the override tag if present and valid,
    /// otherwise the engine default.
    pub capacity: u32,
    /// Live runtime connection, if the daemon answered.
    pub connection: Option<Arc<dyn RuntimeConnection>>,
    /// Running workloads carrying the ownership label. Zero whenever
    /// the runtime was unreachable.
    pub occupancy: u32,
}

impl HostSnapshot {
    /// Host is running, its runtime answered, and it has room.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.host.is_running() && self.connection.is_some() && self.occupancy < self.capacity
    }

    /// Host is stopped and could be woken.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.host.is_stopped()
    }
}

impl std::fmt::Debug for HostSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSnapshot")
            .field("host", &self.host.id)
            .field("state", &self.host.state)
            .field("capacity", &self.capacity)
            .field("reachable", &self.connection.is_some())
            .field("occupancy", &self.occupancy)
            .finish()
    }
}

/// Resolves a host's effective capacity.
///
/// An unparseable override value falls back to the default with a
/// warning rather than failing the attempt; one mistyped tag must not
/// poison every placement against the pool.
pub fn effective_capacity(host: &HostRef, override_tag: Option<&str>, default: u32) -> u32 {
    let Some(tag) = override_tag else {
        return default;
    };
    match host.tag(tag) {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!(host = %host.id, tag, value, "ignoring unparseable capacity override");
            default
        }),
    }
}

/// Observes one host: waits out any residual boot grace, probes the
/// runtime, and counts labeled occupancy.
///
/// Probe failures are swallowed: they mark the host unusable for this
/// attempt, nothing more.
pub(crate) async fn observe(
    probe: &dyn RuntimeProbe,
    host: HostRef,
    capacity: u32,
    label: &str,
    boot_grace: Duration,
    security: Option<&TransportSecurity>,
) -> HostSnapshot {
    if !host.is_running() {
        return HostSnapshot {
            host,
            capacity,
            connection: None,
            occupancy: 0,
        };
    }

    // A host that started moments ago gets the rest of its grace
    // period before we expect its daemon to answer.
    if let Some(launched_at) = host.launched_at {
        let uptime = (Utc::now() - launched_at).to_std().unwrap_or(Duration::ZERO);
        if uptime < boot_grace {
            tokio::time::sleep(boot_grace - uptime).await;
        }
    }

    let (connection, occupancy) = match probe_runtime(probe, &host, label, security).await {
        Ok(observed) => observed,
        Err(reason) => {
            debug!(host = %host.id, %reason, "host runtime unusable for this attempt");
            (None, 0)
        }
    };

    HostSnapshot {
        host,
        capacity,
        connection,
        occupancy,
    }
}

async fn probe_runtime(
    probe: &dyn RuntimeProbe,
    host: &HostRef,
    label: &str,
    security: Option<&TransportSecurity>,
) -> Result<(Option<Arc<dyn RuntimeConnection>>, u32), berth_runtime::RuntimeError> {
    let Some(address) = host.public_address.as_deref() else {
        return Ok((None, 0));
    };

    let connection = probe.connect(address, security).await?;
    connection.ping().await?;
    let occupancy = connection.list_workloads(label).await?.len() as u32;
    Ok((Some(connection), occupancy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_pool::HostState;
    use std::collections::HashMap;

    fn host_with_tag(key: &str, value: &str) -> HostRef {
        HostRef {
            id: "h-1".to_string(),
            public_address: None,
            launched_at: None,
            tags: HashMap::from([(key.to_string(), value.to_string())]),
            state: HostState::Running,
        }
    }

    #[test]
    fn capacity_defaults_without_override() {
        let host = host_with_tag("unrelated", "tag");
        assert_eq!(effective_capacity(&host, None, 2), 2);
        assert_eq!(effective_capacity(&host, Some("ci-capacity"), 2), 2);
    }

    #[test]
    fn capacity_override_wins_when_parseable() {
        let host = host_with_tag("ci-capacity", "4");
        assert_eq!(effective_capacity(&host, Some("ci-capacity"), 1), 4);
    }

    #[test]
    fn unparseable_override_falls_back() {
        let host = host_with_tag("ci-capacity", "lots");
        assert_eq!(effective_capacity(&host, Some("ci-capacity"), 3), 3);
    }

    #[test]
    fn stopped_snapshot_never_reports_capacity() {
        let mut host = host_with_tag("x", "y");
        host.state = HostState::Stopped;
        let snapshot = HostSnapshot {
            host,
            capacity: 4,
            connection: None,
            occupancy: 0,
        };
        assert!(!snapshot.has_capacity());
        assert!(snapshot.is_stopped());
    }
}
