// src/dag/build.rs

//! Building a [`DependencyGraph`] and its subjects from a validated
//! [`ConfigFile`].

use std::collections::HashMap;

use crate::config::model::{CheckupConfig, ConfigFile, JobConfig, SubjectConfig};
use crate::dag::DependencyGraph;
use crate::errors::{FlowError, Result};
use crate::model::{Approver, Checkup, CheckupId, Command, Job, JobId, Subject};
use crate::schedule::Schedule;

impl DependencyGraph {
    /// Jobs get ids `1..` in name order. Every parent edge goes through the
    /// same cycle guard as [`DependencyGraph::add_edge`].
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        let ids: HashMap<&str, JobId> = cfg
            .job
            .keys()
            .enumerate()
            .map(|(index, name)| (name.as_str(), JobId(index as u64 + 1)))
            .collect();

        let mut graph = DependencyGraph::new();
        for (name, job) in cfg.job.iter() {
            graph.insert(job_from_config(name, job, &ids)?)?;
        }

        for (name, job) in cfg.job.iter() {
            let child = lookup(&ids, name)?;
            for parent in job.parents.iter() {
                graph.add_edge(child, lookup(&ids, &parent.name)?, parent.scope, parent.blocker)?;
            }
        }

        Ok(graph)
    }

    /// Subjects of `cfg`, with job names resolved against this graph.
    pub fn subjects_from_config(&self, cfg: &ConfigFile) -> Result<Vec<Subject>> {
        cfg.subject
            .iter()
            .map(|(name, subject)| self.subject_from_config(name, subject))
            .collect()
    }

    fn subject_from_config(&self, name: &str, cfg: &SubjectConfig) -> Result<Subject> {
        let jobs = cfg
            .jobs
            .iter()
            .map(|job| {
                self.find_by_name(job)
                    .map(|job| job.id)
                    .ok_or_else(|| FlowError::JobNotFound(job.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut subject = Subject::new(name, jobs);
        subject.channels = cfg.channels.clone();
        subject.notified = cfg.notified;
        Ok(subject)
    }
}

fn lookup(ids: &HashMap<&str, JobId>, name: &str) -> Result<JobId> {
    ids.get(name)
        .copied()
        .ok_or_else(|| FlowError::JobNotFound(name.to_string()))
}

fn job_from_config(name: &str, cfg: &JobConfig, ids: &HashMap<&str, JobId>) -> Result<Job> {
    let mut job = Job::new(lookup(ids, name)?, name);
    job.enabled = cfg.enabled;
    job.tolerance = cfg.tolerance;
    job.retry = cfg.retry;
    job.rebuild = cfg.rebuild;
    job.wait = cfg.wait;
    job.any_scope = cfg.any_scope;
    job.time_restriction = cfg
        .time_restriction
        .as_deref()
        .map(Schedule::parse)
        .transpose()?;
    job.notify = cfg.notify;
    job.channel = cfg.channel.clone();
    job.approver = cfg.approver.as_ref().map(|a| Approver {
        username: a.username.clone(),
        email: a.email.clone(),
    });
    job.server = cfg.server.clone();
    job.checkups = cfg
        .checkups
        .iter()
        .map(|checkup| checkup_from_config(checkup, ids))
        .collect::<Result<_>>()?;
    Ok(job)
}

fn checkup_from_config(cfg: &CheckupConfig, ids: &HashMap<&str, JobId>) -> Result<Checkup> {
    let mut checkup = Checkup::new(CheckupId(cfg.id), cfg.name.as_str(), cfg.query.as_str());
    checkup.threshold = cfg.threshold.clone();
    checkup.conditional = cfg.conditional;
    checkup.scope = cfg.scope;
    checkup.prevalidation = cfg.prevalidation;
    checkup.action = cfg.action;
    checkup.enabled = cfg.enabled;
    checkup.channels = cfg.channels.clone();
    checkup.commands = cfg
        .commands
        .iter()
        .map(|c| Command {
            kind: c.kind,
            command: c.command.clone(),
        })
        .collect();
    checkup.triggers = cfg
        .triggers
        .iter()
        .map(|name| lookup(ids, name))
        .collect::<Result<_>>()?;
    Ok(checkup)
}
