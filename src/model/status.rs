// src/model/status.rs

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::clock::local_from_epoch_millis;
use crate::types::{BuildStatus, Flow, Phase, Scope};

/// One build-server execution as reported by a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub number: u64,
    pub phase: Phase,
    pub status: BuildStatus,
    pub date: NaiveDateTime,
}

impl Build {
    pub fn is_finalized_success(&self) -> bool {
        self.phase == Phase::Finalized && self.status == BuildStatus::Success
    }
}

/// A job's pointer to its last significant state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub flow: Flow,
    /// Scope the job was last built at.
    pub scope: Scope,
    pub date: NaiveDateTime,
    pub failure_timestamp: Option<NaiveDateTime>,
    pub build: Option<Build>,
}

impl JobStatus {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            flow: Flow::Normal,
            scope: Scope::Full,
            date: now,
            failure_timestamp: None,
            build: None,
        }
    }

    /// Stamp the failure timestamp if the status describes a failure.
    ///
    /// A failure is either a failing flow or a broken build.
    pub fn stamp_failure(&mut self, now: NaiveDateTime) {
        let broken_build = self
            .build
            .as_ref()
            .is_some_and(|build| build.status.is_broken());

        if self.flow.is_failure() || broken_build {
            self.failure_timestamp = Some(now);
        }
    }
}

/// Webhook payload sent by the build server's notification plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub name: String,
    pub build: BuildPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPayload {
    pub number: u64,
    pub phase: Phase,
    /// Missing or empty on some phases; counts as a success.
    #[serde(default = "success_status", deserialize_with = "status_or_success")]
    pub status: BuildStatus,
    /// Epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

fn success_status() -> BuildStatus {
    BuildStatus::Success
}

fn status_or_success<'de, D>(deserializer: D) -> Result<BuildStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(BuildStatus::Success),
        Some(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

impl BuildEvent {
    /// Convert the payload into a [`Build`].
    ///
    /// A timestamp outside the representable range falls back to `now`.
    pub fn to_build(&self, now: NaiveDateTime) -> Build {
        Build {
            number: self.build.number,
            phase: self.build.phase,
            status: self.build.status,
            date: local_from_epoch_millis(self.build.timestamp).unwrap_or(now),
        }
    }
}
