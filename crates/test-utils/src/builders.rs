#![allow(dead_code)]

use std::collections::BTreeMap;

use jobflow::config::{
    CheckupConfig, ConfigFile, EngineSection, HttpSection, JobConfig, NotifySection,
    ParentConfig, RawConfigFile, ServerConfig, SubjectConfig,
};
use jobflow::model::{Approver, Checkup, CheckupId, Command, Job, JobId, ParentEdge};
use jobflow::schedule::Schedule;
use jobflow::types::{Action, CommandKind, Conditional, Scope};

/// Builder for `Job` to simplify test setup.
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            job: Job::new(JobId(id), name),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.job.enabled = false;
        self
    }

    pub fn tolerance(mut self, hours: u32) -> Self {
        self.job.tolerance = hours;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.job.retry = retry;
        self
    }

    /// Allow rebuilds, `wait` minutes apart.
    pub fn rebuild(mut self, wait: u32) -> Self {
        self.job.rebuild = true;
        self.job.wait = wait;
        self
    }

    pub fn any_scope(mut self) -> Self {
        self.job.any_scope = true;
        self
    }

    pub fn restricted(mut self, expr: &str) -> Self {
        self.job.time_restriction =
            Some(Schedule::parse(expr).expect("valid time restriction in test"));
        self
    }

    pub fn notify(mut self, channel: &str) -> Self {
        self.job.notify = true;
        self.job.channel = Some(channel.to_string());
        self
    }

    pub fn approver(mut self, username: &str, email: Option<&str>) -> Self {
        self.job.approver = Some(Approver {
            username: username.to_string(),
            email: email.map(str::to_string),
        });
        self
    }

    pub fn server(mut self, server: &str) -> Self {
        self.job.server = Some(server.to_string());
        self
    }

    pub fn parent(mut self, parent: u64, scope: Scope) -> Self {
        self.job.parents.push(ParentEdge {
            parent: JobId(parent),
            scope,
            blocker: false,
        });
        self
    }

    pub fn blocker_parent(mut self, parent: u64) -> Self {
        self.job.parents.push(ParentEdge {
            parent: JobId(parent),
            scope: Scope::Full,
            blocker: true,
        });
        self
    }

    pub fn checkup(mut self, checkup: Checkup) -> Self {
        self.job.checkups.push(checkup);
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

/// Builder for `Checkup`.
pub struct CheckupBuilder {
    checkup: Checkup,
}

impl CheckupBuilder {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            checkup: Checkup::new(CheckupId(id), name, format!("echo {name}")),
        }
    }

    pub fn query(mut self, query: &str) -> Self {
        self.checkup.query = query.to_string();
        self
    }

    pub fn threshold(mut self, conditional: Conditional, threshold: &str) -> Self {
        self.checkup.conditional = conditional;
        self.checkup.threshold = threshold.to_string();
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.checkup.scope = scope;
        self
    }

    pub fn prevalidation(mut self) -> Self {
        self.checkup.prevalidation = true;
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.checkup.action = action;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.checkup.enabled = false;
        self
    }

    pub fn channel(mut self, channel: &str) -> Self {
        self.checkup.channels.push(channel.to_string());
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.checkup.commands.push(Command {
            kind: CommandKind::Shell,
            command: command.to_string(),
        });
        self
    }

    pub fn trigger(mut self, job: u64) -> Self {
        self.checkup.triggers.push(JobId(job));
        self
    }

    pub fn build(self) -> Checkup {
        self.checkup
    }
}

/// Builder for `ConfigFile`.
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                engine: EngineSection::default(),
                server: ServerConfig {
                    name: "default".to_string(),
                    url: "http://jenkins.test/".to_string(),
                    user: None,
                    token: None,
                },
                http: HttpSection::default(),
                notify: NotifySection::default(),
                job: BTreeMap::new(),
                subject: BTreeMap::new(),
            },
        }
    }

    /// Add a job with default settings and FULL parents.
    pub fn job(self, name: &str, parents: &[&str]) -> Self {
        let job = JobConfig {
            parents: parents
                .iter()
                .map(|parent| ParentConfig {
                    name: parent.to_string(),
                    scope: Scope::Full,
                    blocker: false,
                })
                .collect(),
            ..JobConfig::default()
        };
        self.with_job(name, job)
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn with_checkup(mut self, job: &str, checkup: CheckupConfig) -> Self {
        self.config
            .job
            .entry(job.to_string())
            .or_default()
            .checkups
            .push(checkup);
        self
    }

    pub fn subject(mut self, name: &str, jobs: &[&str]) -> Self {
        let subject = SubjectConfig {
            jobs: jobs.iter().map(|job| job.to_string()).collect(),
            channels: Vec::new(),
            notified: true,
        };
        self.config.subject.insert(name.to_string(), subject);
        self
    }

    pub fn watchdog(mut self, expr: &str) -> Self {
        self.config.engine.watchdog = expr.to_string();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.engine.workers = workers;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A checkup config with the given action and no commands.
pub fn checkup_config(id: u64, name: &str, action: Action) -> CheckupConfig {
    CheckupConfig {
        id,
        name: name.to_string(),
        query: format!("echo {name}"),
        threshold: "1".to_string(),
        conditional: Conditional::Equal,
        scope: Scope::Full,
        prevalidation: false,
        action,
        enabled: true,
        channels: Vec::new(),
        commands: Vec::new(),
        triggers: Vec::new(),
    }
}
