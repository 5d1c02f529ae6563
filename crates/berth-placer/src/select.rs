//! Pure selection and reconciliation helpers.

use berth_runtime::{WorkloadId, WorkloadSummary};
use rand::rngs::SmallRng;
use rand::Rng;
use std::time::Duration;

use crate::snapshot::HostSnapshot;

/// Indices of running-with-capacity snapshots at minimum occupancy.
///
/// Spreading across the minimum set (rather than always taking the
/// first candidate) keeps load even and avoids convoying onto one
/// host.
pub fn least_occupied(snapshots: &[HostSnapshot]) -> Vec<usize> {
    let min = snapshots
        .iter()
        .filter(|s| s.has_capacity())
        .map(|s| s.occupancy)
        .min();

    match min {
        None => Vec::new(),
        Some(min) => snapshots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.has_capacity() && s.occupancy == min)
            .map(|(i, _)| i)
            .collect(),
    }
}

/// Indices of stopped snapshots.
pub fn stopped(snapshots: &[HostSnapshot]) -> Vec<usize> {
    snapshots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_stopped())
        .map(|(i, _)| i)
        .collect()
}

/// Picks uniformly at random from a candidate index set.
pub fn pick(rng: &mut SmallRng, candidates: &[usize]) -> Option<usize> {
    match candidates {
        [] => None,
        [only] => Some(*only),
        _ => Some(candidates[rng.gen_range(0..candidates.len())]),
    }
}

/// Samples a backoff uniformly from `[min, max)`.
pub fn sample_backoff(rng: &mut SmallRng, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rng.gen_range(min.as_millis() as u64..max.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Ids of the workloads that do not fit on a host of the given
/// capacity: the newest `len - capacity`, oldest work keeps its slot.
///
/// Creation-time ties break by id so that two engines reconciling the
/// same host reach the same verdict.
pub fn surplus(workloads: &[WorkloadSummary], capacity: u32) -> Vec<WorkloadId> {
    if workloads.len() <= capacity as usize {
        return Vec::new();
    }

    let mut ordered: Vec<&WorkloadSummary> = workloads.iter().collect();
    ordered.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    ordered
        .into_iter()
        .skip(capacity as usize)
        .map(|w| w.id.clone())
        .collect()
}
