// src/store/locks.rs

use chrono::{Duration, NaiveDateTime};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::model::JobId;

/// Rejects a second trigger of the same job within a short window.
///
/// The stamp is taken and checked under the map's per-key entry lock, so two
/// concurrent callers never both acquire.
#[derive(Debug)]
pub struct DedupLock {
    name: &'static str,
    window: Duration,
    stamps: DashMap<JobId, NaiveDateTime>,
}

impl DedupLock {
    pub fn new(name: &'static str, window: Duration) -> Self {
        Self {
            name,
            window,
            stamps: DashMap::new(),
        }
    }

    /// Stamp the job at `now` unless it was stamped less than the window ago.
    ///
    /// Returns `true` when the caller may proceed.
    pub fn try_acquire(&self, job: JobId, now: NaiveDateTime) -> bool {
        match self.stamps.entry(job) {
            Entry::Occupied(mut entry) => {
                let locked_at = *entry.get();
                if now - locked_at > self.window {
                    entry.insert(now);
                    true
                } else {
                    info!(
                        lock = self.name,
                        job = %job,
                        locked_at = %locked_at,
                        "duplicated build protection"
                    );
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    pub fn locked_at(&self, job: JobId) -> Option<NaiveDateTime> {
        self.stamps.get(&job).map(|stamp| *stamp)
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Consecutive checkup remediations per job.
#[derive(Debug, Default)]
pub struct RetryCounter {
    counts: DashMap<JobId, u32>,
}

impl RetryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job: JobId) -> u32 {
        self.counts.get(&job).map_or(0, |count| *count)
    }

    /// Increment and return the new count.
    pub fn increase(&self, job: JobId) -> u32 {
        let mut count = self.counts.entry(job).or_insert(0);
        *count += 1;
        *count
    }

    pub fn remove(&self, job: JobId) {
        self.counts.remove(&job);
    }

    pub fn exists(&self, job: JobId) -> bool {
        self.counts.contains_key(&job)
    }
}
