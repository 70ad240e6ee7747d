// src/engine/checkup.rs

//! Health checkup evaluation.
//!
//! A failing checkup first runs its remediation commands, then gets one
//! revalidation pass. Query errors count as failing comparisons.

use tracing::{debug, info, warn};

use crate::engine::{Engine, Task};
use crate::errors::Result;
use crate::exec::Notification;
use crate::flow::{check, macro_reference};
use crate::model::{Checkup, CheckupId, CheckupLog, CommandLog, Job};
use crate::types::{Action, Flow, Scope};

/// Outcome of one evaluation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub healthy: bool,
    /// Number of checkups that were run.
    pub evaluated: usize,
    /// The checkup that stopped the evaluation.
    pub failed: Option<CheckupId>,
}

impl Evaluation {
    fn healthy(evaluated: usize) -> Self {
        Self {
            healthy: true,
            evaluated,
            failed: None,
        }
    }
}

struct Attempt {
    threshold: String,
    value: String,
    success: bool,
    commands: Vec<CommandLog>,
}

impl Engine {
    /// Whether `job` has checkups for this kind of validation at `scope`.
    pub fn has_checkups(job: &Job, prevalidation: bool, scope: Scope) -> bool {
        job.checkups
            .iter()
            .any(|checkup| checkup.applies_to(scope, prevalidation))
    }

    /// Evaluate the checkups of `job` matching `scope` and `prevalidation`.
    ///
    /// A failing post-validation marks the job UNHEALTHY; for pre-validation
    /// the caller marks it BLOCKED.
    pub async fn evaluate(&self, job: &Job, prevalidation: bool, scope: Scope) -> Result<Evaluation> {
        let applicable: Vec<&Checkup> = job
            .checkups
            .iter()
            .filter(|checkup| checkup.applies_to(scope, prevalidation))
            .collect();

        if applicable.is_empty() {
            return Ok(Evaluation::healthy(0));
        }

        self.update_flow(job.id, Flow::Checkup)?;

        let mut evaluated = 0;
        for checkup in applicable.into_iter().filter(|checkup| checkup.enabled) {
            evaluated += 1;
            let attempt = self.attempt(job, checkup).await;
            self.log_attempt(job, checkup, scope, &attempt);

            if attempt.success {
                continue;
            }

            if checkup.action == Action::LogAndContinue {
                info!(job = %job.name, checkup = %checkup.name, "checkup failed; continuing");
                continue;
            }

            warn!(
                job = %job.name,
                checkup = %checkup.name,
                prevalidation,
                value = %attempt.value,
                threshold = %attempt.threshold,
                "checkup failed"
            );

            if !prevalidation {
                self.update_flow(job.id, Flow::Unhealthy)?;
            }
            self.notify(checkup_failure(job, checkup, &attempt));
            self.schedule_remediation(job, checkup);

            return Ok(Evaluation {
                healthy: false,
                evaluated,
                failed: Some(checkup.id),
            });
        }

        self.retries.remove(job.id);
        Ok(Evaluation::healthy(evaluated))
    }

    /// Replace a `${N}` threshold with the last value logged by checkup N.
    ///
    /// Unresolved references stay literal and never satisfy a comparison.
    pub fn resolve_threshold(&self, threshold: &str) -> String {
        match macro_reference(threshold) {
            Some(reference) => match self.repo.latest_checkup_log(reference) {
                Some(log) => log.value,
                None => {
                    debug!(threshold, "threshold reference has no logged value");
                    threshold.to_string()
                }
            },
            None => threshold.to_string(),
        }
    }

    async fn attempt(&self, job: &Job, checkup: &Checkup) -> Attempt {
        let threshold = self.resolve_threshold(&checkup.threshold);
        let value = self.query_value(checkup).await;
        let success = check(&value, &threshold, checkup.conditional);

        let mut attempt = Attempt {
            threshold,
            value,
            success,
            commands: Vec::new(),
        };

        if success || checkup.commands.is_empty() {
            return attempt;
        }

        let mut all_succeeded = true;
        for command in &checkup.commands {
            let (success, output) = match self.probe.execute(checkup, command).await {
                Ok(outcome) => (outcome.success, outcome.output),
                Err(err) => (false, err.to_string()),
            };
            attempt.commands.push(CommandLog {
                command: command.command.clone(),
                output,
                success,
                date: self.clock.now(),
            });
            if !success {
                warn!(job = %job.name, checkup = %checkup.name, "remediation command failed; aborting chain");
                all_succeeded = false;
                break;
            }
        }

        if all_succeeded {
            debug!(job = %job.name, checkup = %checkup.name, "revalidating checkup");
            attempt.threshold = self.resolve_threshold(&checkup.threshold);
            attempt.value = self.query_value(checkup).await;
            attempt.success = check(&attempt.value, &attempt.threshold, checkup.conditional);
        }

        attempt
    }

    async fn query_value(&self, checkup: &Checkup) -> String {
        match self.probe.query(checkup).await {
            Ok(value) => value,
            Err(err) => {
                warn!(checkup = %checkup.name, error = %err, "checkup query failed");
                String::new()
            }
        }
    }

    fn log_attempt(&self, job: &Job, checkup: &Checkup, scope: Scope, attempt: &Attempt) {
        let log = CheckupLog {
            checkup: checkup.id,
            job: job.id,
            date: self.clock.now(),
            query: checkup.query.clone(),
            threshold: attempt.threshold.clone(),
            conditional: checkup.conditional,
            value: attempt.value.clone(),
            success: attempt.success,
            action: checkup.action,
            scope,
            commands: attempt.commands.clone(),
        };
        if let Err(err) = self.repo.append_checkup_log(log) {
            warn!(job = %job.name, checkup = %checkup.name, error = %err, "failed to store checkup log");
        }
    }

    /// Count the failure and dispatch the remediation while retries remain.
    fn schedule_remediation(&self, job: &Job, checkup: &Checkup) {
        let remediable = match checkup.action {
            Action::Rebuild | Action::RebuildMesh | Action::RebuildTrigger => true,
            Action::LogAndContinue | Action::Abort => false,
        };

        let attempts = self.retries.get(job.id);
        if remediable && (job.retry == 0 || attempts < job.retry) {
            let attempts = self.retries.increase(job.id);
            info!(
                job = %job.name,
                checkup = %checkup.name,
                action = %checkup.action,
                attempts,
                "dispatching remediation"
            );
            self.tasks.submit(Task::Remediate {
                job: job.id,
                checkup: checkup.id,
            });
        } else {
            debug!(job = %job.name, attempts, retry = job.retry, "retry counter cleared");
            self.retries.remove(job.id);
        }
    }
}

fn checkup_failure(job: &Job, checkup: &Checkup, attempt: &Attempt) -> Notification {
    let mut channels = checkup.channels.clone();
    if job.notify {
        channels.extend(job.channel.clone());
    }
    if let Some(email) = job.approver.as_ref().and_then(|a| a.email.as_deref()) {
        channels.push(Notification::mail_channel(email));
    }

    let text = format!(
        ":warning: Checkup *{}* failed on job *{}*\nThreshold: {} {}\nResult: {}",
        checkup.name,
        job.name,
        checkup.conditional,
        attempt.threshold,
        if attempt.value.is_empty() { "<none>" } else { attempt.value.as_str() },
    );

    Notification::new(channels, text)
}
