//! Configuration types for the placement engine.

use serde::Deserialize;
use std::time::Duration;

/// Placement engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlacerConfig {
    /// Ownership label attached to every launched workload and used to
    /// count occupancy. Engines sharing a label compete for the same
    /// capacity; everything else on a host is invisible to them.
    pub label: String,
    /// Per-host capacity when no override tag is present.
    pub default_capacity: u32,
    /// Time allowed after a host starts before its runtime is expected
    /// to answer probes.
    #[serde(with = "serde_duration_secs")]
    pub boot_grace: Duration,
    /// Backoff window for saturated pools.
    pub backoff: BackoffConfig,
    /// Attempt cap for one placement call.
    pub max_attempts: u32,
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self {
            label: "io.berth.workload".to_owned(),
            default_capacity: 1,
            boot_grace: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
            max_attempts: 5,
        }
    }
}

/// Backoff window sampled when the pool has no capacity and nothing to
/// start. The window is wide and the sample uniform so that multiple
/// waiting engines do not retry in lockstep once capacity frees up.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Inclusive lower bound.
    #[serde(with = "serde_duration_secs")]
    pub min: Duration,
    /// Exclusive upper bound.
    #[serde(with = "serde_duration_secs")]
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(60),
            max: Duration::from_secs(180),
        }
    }
}

/// Serde helper for Duration as seconds.
mod serde_duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
