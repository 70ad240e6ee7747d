// src/flow/buildability.rs

//! Build freshness and buildability.
//!
//! "Fresh" is a calendar notion: a build is fresh if it happened today, or if
//! the job has a tolerance and the build happened less than `tolerance` hours
//! ago. A job with `tolerance = 6` built at 23:00 stays fresh until 05:00.

use chrono::{Duration, NaiveDateTime};

use crate::flow::FlowContext;
use crate::model::{Job, JobId, JobStatus};
use crate::types::{Flow, Scope};

/// Why a job may be built now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
    /// No status or no build recorded yet.
    NeverBuilt,
    /// Last build is no longer fresh.
    Stale,
    /// Built today, but only at partial scope.
    PartialScope,
    /// Built today, and rebuilds are allowed.
    Rebuild,
    /// Built today, but the flow asks for another run (REBUILD or ERROR).
    Recovery,
}

/// Why a job may not be built now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    Disabled,
    /// Outside the job's time restriction window.
    Restricted,
    /// Fresh full build and no rebuild policy.
    AlreadyBuilt,
    /// A blocker parent has not been rebuilt since the job's last build.
    BlockedBy(JobId),
    /// Rebuild wait has not elapsed yet.
    Waiting { remaining_minutes: i64 },
    /// Triggered moments ago.
    Deduplicated,
}

/// Whether a build made at `build_date` is still fresh for `job` at `now`.
pub fn is_fresh(job: &Job, build_date: NaiveDateTime, now: NaiveDateTime) -> bool {
    if build_date.date() == now.date() {
        return true;
    }

    job.tolerance > 0 && now < build_date + Duration::hours(i64::from(job.tolerance))
}

/// Whether `job` counts as built.
///
/// Requires a finalized successful build under a settled flow (NORMAL or
/// APPROVED), fresh at `now`, and at FULL scope unless `any_scope` is set.
/// When `basedate` is given, a build from today must also be later than it.
pub fn is_built(
    job: &Job,
    status: Option<&JobStatus>,
    basedate: Option<NaiveDateTime>,
    any_scope: bool,
    now: NaiveDateTime,
) -> bool {
    let Some(status) = status else {
        return false;
    };
    let Some(build) = status.build.as_ref() else {
        return false;
    };

    let fresh = if build.date.date() == now.date() {
        basedate.is_none_or(|base| build.date > base)
    } else {
        is_fresh(job, build.date, now)
    };

    fresh
        && build.is_finalized_success()
        && status.flow.is_settled()
        && (any_scope || status.scope == Scope::Full)
}

/// Decide whether `job` may be built, ignoring the dedup lock.
pub fn check_buildable(ctx: &FlowContext<'_>, job: &Job) -> Result<Ready, Denied> {
    if !job.enabled {
        return Err(Denied::Disabled);
    }

    let restricted = job
        .time_restriction
        .as_ref()
        .is_some_and(|window| !window.matches_minute(ctx.now));
    if restricted {
        return Err(Denied::Restricted);
    }

    let Some(status) = ctx.status(job.id) else {
        return Ok(Ready::NeverBuilt);
    };
    let Some(build) = status.build.as_ref() else {
        return Ok(Ready::NeverBuilt);
    };

    if !is_fresh(job, build.date, ctx.now) {
        return Ok(Ready::Stale);
    }

    let history = if status.scope == Scope::Partial {
        Ok(Ready::PartialScope)
    } else if job.rebuild {
        rebuild_policy(ctx, job, build.date)
    } else {
        Err(Denied::AlreadyBuilt)
    };

    match history {
        Ok(ready) => Ok(ready),
        Err(denied) => match status.flow {
            Flow::Error | Flow::Rebuild => Ok(Ready::Recovery),
            Flow::Normal
            | Flow::Queued
            | Flow::Transient
            | Flow::Checkup
            | Flow::Unhealthy
            | Flow::Blocked
            | Flow::Approved
            | Flow::Disapproved => Err(denied),
        },
    }
}

fn rebuild_policy(
    ctx: &FlowContext<'_>,
    job: &Job,
    last_build: NaiveDateTime,
) -> Result<Ready, Denied> {
    if job.rebuild_blocked {
        for edge in job.parents.iter().filter(|edge| edge.blocker) {
            let Some(parent) = ctx.graph.job(edge.parent) else {
                continue;
            };
            let status = ctx.status(edge.parent);
            if !is_built(parent, status.as_ref(), Some(last_build), false, ctx.now) {
                return Err(Denied::BlockedBy(edge.parent));
            }
        }
    }

    if job.wait > 0 {
        let elapsed = (ctx.now - last_build).num_minutes();
        let wait = i64::from(job.wait);
        if elapsed < wait {
            return Err(Denied::Waiting {
                remaining_minutes: wait - elapsed,
            });
        }
    }

    Ok(Ready::Rebuild)
}
