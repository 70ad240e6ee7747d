// src/flow/details.rs

use chrono::NaiveDateTime;

use crate::flow::buildability::is_fresh;
use crate::model::{Job, JobStatus};
use crate::types::{BuildStatus, DisplayStatus, Flow, Phase};

/// Status shown for a job, and used by the watchdog to spot stalled jobs.
///
/// Precedence, highest first:
///
/// 1. DISABLED for a disabled job.
/// 2. RESTRICTED when the last build exists and `now` is outside the time
///    window.
/// 3. For a fresh build: REBUILD, or the flow when it needs attention, or
///    the build outcome (UNSTABLE if a failure was stamped today, RUNNING
///    while the build has not finalized).
/// 4. For an older build: REBUILD, else the flow unless it is NORMAL or
///    TRANSIENT, else WAITING.
/// 5. Never built: REBUILD when a rebuild was requested, else WAITING.
pub fn display_status(job: &Job, status: Option<&JobStatus>, now: NaiveDateTime) -> DisplayStatus {
    if !job.enabled {
        return DisplayStatus::Disabled;
    }

    let Some(status) = status else {
        return DisplayStatus::Waiting;
    };

    let Some(build) = status.build.as_ref() else {
        return match status.flow {
            Flow::Rebuild => DisplayStatus::Rebuild,
            _ => DisplayStatus::Waiting,
        };
    };

    let restricted = job
        .time_restriction
        .as_ref()
        .is_some_and(|window| !window.matches_minute(now));
    if restricted {
        return DisplayStatus::Restricted;
    }

    if is_fresh(job, build.date, now) {
        match status.flow {
            Flow::Rebuild => DisplayStatus::Rebuild,
            Flow::Unhealthy
            | Flow::Blocked
            | Flow::Approved
            | Flow::Disapproved
            | Flow::Error
            | Flow::Checkup => DisplayStatus::from(status.flow),
            Flow::Normal | Flow::Queued | Flow::Transient => {
                if build.phase == Phase::Finalized || build.status.is_broken() {
                    let failed_today = status
                        .failure_timestamp
                        .is_some_and(|at| at.date() == now.date());

                    if build.status == BuildStatus::Success && failed_today {
                        DisplayStatus::Unstable
                    } else {
                        DisplayStatus::from(build.status)
                    }
                } else {
                    DisplayStatus::Running
                }
            }
        }
    } else {
        DisplayStatus::from(status.flow)
    }
}
