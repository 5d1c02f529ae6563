//! Test fixtures for placement integration tests.

use berth_placer::{PlacementObserver, RetryReason};
use berth_pool::{HostId, HostRef, HostState};
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Builder for pool hosts.
pub struct HostBuilder {
    id: String,
    address: String,
    state: HostState,
    launched_ago: Option<ChronoDuration>,
    tags: HashMap<String, String>,
}

impl HostBuilder {
    /// Creates a builder for a running host launched an hour ago, so
    /// no boot grace remains.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            address: format!("{id}.pool.test"),
            state: HostState::Running,
            launched_ago: Some(ChronoDuration::hours(1)),
            tags: HashMap::new(),
        }
    }

    /// Marks the host stopped.
    pub fn stopped(mut self) -> Self {
        self.state = HostState::Stopped;
        self.launched_ago = None;
        self
    }

    /// Sets how long ago the host launched.
    pub fn launched_ago(mut self, ago: Duration) -> Self {
        self.launched_ago = Some(ChronoDuration::from_std(ago).unwrap());
        self
    }

    /// Adds a metadata tag.
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Builds the host.
    pub fn build(self) -> HostRef {
        HostRef {
            id: self.id,
            public_address: Some(self.address),
            launched_at: self.launched_ago.map(|ago| Utc::now() - ago),
            tags: self.tags,
            state: self.state,
        }
    }
}

/// Placement events recorded during a test.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Selected(HostId, u32, u32),
    Started(HostId),
    Race(HostId, String),
    Retried(u32, RetryReason),
    Backoff(Duration),
}

/// Observer that records every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn retry_reasons(&self) -> Vec<RetryReason> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Retried(_, reason) => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn race_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Race(..)))
            .count()
    }

    pub fn started_hosts(&self) -> Vec<HostId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(host) => Some(host),
                _ => None,
            })
            .collect()
    }
}

impl PlacementObserver for RecordingObserver {
    fn host_selected(&self, host: &HostId, occupancy: u32, capacity: u32) {
        self.events
            .lock()
            .push(Event::Selected(host.clone(), occupancy, capacity));
    }

    fn host_started(&self, host: &HostId) {
        self.events.lock().push(Event::Started(host.clone()));
    }

    fn race_detected(&self, host: &HostId, workload: &str) {
        self.events
            .lock()
            .push(Event::Race(host.clone(), workload.to_string()));
    }

    fn attempt_retried(&self, attempt: u32, reason: &RetryReason) {
        self.events
            .lock()
            .push(Event::Retried(attempt, reason.clone()));
    }

    fn backing_off(&self, duration: Duration) {
        self.events.lock().push(Event::Backoff(duration));
    }
}
