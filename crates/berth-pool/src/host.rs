//! Host descriptions as reported by a pool provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique host identifier.
pub type HostId = String;

/// A host as the pool provider last reported it.
///
/// This is an observation, not a live handle: the host may have changed
/// state since the provider produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRef {
    /// Unique host identifier.
    pub id: HostId,
    /// Address the container runtime answers on, if the host has one.
    pub public_address: Option<String>,
    /// When the host was last launched.
    pub launched_at: Option<DateTime<Utc>>,
    /// Provider metadata tags.
    pub tags: HashMap<String, String>,
    /// Reported lifecycle state.
    pub state: HostState,
}

impl HostRef {
    /// Looks up a metadata tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns true if the provider reports the host running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Returns true if the host is stopped and could be started.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }
}

/// Host lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostState {
    /// Launch requested, not yet running.
    Pending,
    /// Host is up.
    Running,
    /// Shutdown in progress.
    Stopping,
    /// Host is down but can be started again.
    Stopped,
    /// Host is gone for good.
    Terminated,
}

impl HostState {
    /// Returns true for the running state.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true for the stopped state.
    ///
    /// Pending, stopping and terminated hosts are neither usable nor
    /// startable, so they fall out of both partitions.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }
}
