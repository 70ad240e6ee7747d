// src/clock.rs

//! Wall-clock abstraction.
//!
//! Freshness, tolerance, rebuild waits and the dedup windows are all defined
//! on local wall-clock time ("built today"), so the engine reads time through
//! a [`Clock`] and tests drive it with [`FakeClock`].

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime, TimeZone};
use parking_lot::Mutex;

/// A source of the current local date and time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Real system clock, in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Fake clock for tests with controllable time.
#[derive(Debug, Clone)]
pub struct FakeClock {
    current: Arc<Mutex<NaiveDateTime>>,
}

impl FakeClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
    }

    /// Jump to a specific instant.
    pub fn set(&self, at: NaiveDateTime) {
        *self.current.lock() = at;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> NaiveDateTime {
        *self.current.lock()
    }
}

/// Convert a build-server epoch-millis timestamp into local wall-clock time.
///
/// Out-of-range timestamps yield `None`.
pub fn local_from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.naive_local())
}

/// Inverse of [`local_from_epoch_millis`].
///
/// Times skipped by a DST transition yield `None`; ambiguous ones map to
/// the earlier instant.
pub fn local_to_epoch_millis(at: NaiveDateTime) -> Option<i64> {
    Local
        .from_local_datetime(&at)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}
