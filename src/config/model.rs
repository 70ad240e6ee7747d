// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Duration;
use serde::Deserialize;

use crate::engine::EngineSettings;
use crate::types::{Action, CommandKind, Conditional, Scope};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// watchdog = "0 0 * * * *"
/// workers = 4
///
/// [server]
/// url = "https://jenkins.example.com/"
/// user = "jobflow"
/// token = "..."
///
/// [job.extract_orders]
///
/// [job.etl_orders]
/// tolerance = 2
/// parents = [{ name = "extract_orders" }]
///
/// [subject.orders]
/// jobs = ["extract_orders", "etl_orders"]
/// notified = true
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    pub server: ServerConfig,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub notify: NotifySection,

    /// All jobs from `[job.<name>]`, keyed by job name.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,

    /// Job groups from `[subject.<name>]`, keyed by subject name.
    #[serde(default)]
    pub subject: BTreeMap<String, SubjectConfig>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub server: ServerConfig,
    pub http: HttpSection,
    pub notify: NotifySection,
    pub job: BTreeMap<String, JobConfig>,
    pub subject: BTreeMap<String, SubjectConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            engine: raw.engine,
            server: raw.server,
            http: raw.http,
            notify: raw.notify,
            job: raw.job,
            subject: raw.subject,
        }
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Cron expression of the watchdog sweep.
    #[serde(default = "default_watchdog")]
    pub watchdog: String,

    /// Cron expression of the subject summaries.
    #[serde(default = "default_subject_summary")]
    pub subject_summary: String,

    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the task queue.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u32,

    #[serde(default = "default_approval_retention_days")]
    pub approval_retention_days: u32,

    #[serde(default = "default_watchdog_grace_minutes")]
    pub watchdog_grace_minutes: u32,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Working directory of checkup queries and shell commands.
    #[serde(default = "default_sandbox")]
    pub sandbox: PathBuf,
}

fn default_watchdog() -> String {
    "0 0 * * * *".to_string()
}

fn default_subject_summary() -> String {
    "0 0 * * * *".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_queue_length() -> usize {
    256
}

fn default_dedup_window_secs() -> u32 {
    10
}

fn default_approval_retention_days() -> u32 {
    30
}

fn default_watchdog_grace_minutes() -> u32 {
    30
}

fn default_command_timeout_secs() -> u64 {
    300
}

fn default_sandbox() -> PathBuf {
    PathBuf::from(".jobflow/sandbox")
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            watchdog: default_watchdog(),
            subject_summary: default_subject_summary(),
            workers: default_workers(),
            queue_length: default_queue_length(),
            dedup_window_secs: default_dedup_window_secs(),
            approval_retention_days: default_approval_retention_days(),
            watchdog_grace_minutes: default_watchdog_grace_minutes(),
            command_timeout_secs: default_command_timeout_secs(),
            sandbox: default_sandbox(),
        }
    }
}

impl EngineSection {
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            dedup_window: Duration::seconds(i64::from(self.dedup_window_secs)),
            watchdog_grace: Duration::minutes(i64::from(self.watchdog_grace_minutes)),
            approval_retention: Duration::days(i64::from(self.approval_retention_days)),
        }
    }

    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.command_timeout_secs)
    }
}

/// `[server]` section: the Jenkins build server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name jobs use in their `server` field to target this server.
    #[serde(default = "default_server_name")]
    pub name: String,

    pub url: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub token: Option<String>,
}

fn default_server_name() -> String {
    "default".to_string()
}

/// `[http]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// `[notify]` section. Without a Slack webhook notifications are only
/// logged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifySection {
    #[serde(default)]
    pub slack_webhook: Option<String>,

    #[serde(default)]
    pub default_channel: Option<String>,
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Hours a build stays fresh past midnight.
    #[serde(default)]
    pub tolerance: u32,

    /// Remediation attempts per failing streak; 0 means unlimited.
    #[serde(default)]
    pub retry: u32,

    #[serde(default)]
    pub rebuild: bool,

    /// Minutes between rebuilds.
    #[serde(default)]
    pub wait: u32,

    #[serde(default)]
    pub any_scope: bool,

    /// Cron expression; builds only run while it matches.
    #[serde(default)]
    pub time_restriction: Option<String>,

    #[serde(default)]
    pub notify: bool,

    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default)]
    pub approver: Option<ApproverConfig>,

    /// Build server the job runs on.
    #[serde(default)]
    pub server: Option<String>,

    #[serde(default)]
    pub parents: Vec<ParentConfig>,

    #[serde(default)]
    pub checkups: Vec<CheckupConfig>,
}

fn default_true() -> bool {
    true
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: 0,
            retry: 0,
            rebuild: false,
            wait: 0,
            any_scope: false,
            time_restriction: None,
            notify: false,
            channel: None,
            approver: None,
            server: None,
            parents: Vec::new(),
            checkups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproverConfig {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentConfig {
    pub name: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub blocker: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckupConfig {
    /// Stable id, referenced by `${id}` thresholds.
    pub id: u64,
    pub name: String,
    pub query: String,
    pub threshold: String,
    #[serde(default)]
    pub conditional: Conditional,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub prevalidation: bool,
    #[serde(default)]
    pub action: Action,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
    /// Job names restarted by `REBUILD_TRIGGER`.
    #[serde(default)]
    pub triggers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub kind: CommandKind,
    pub command: String,
}

/// `[subject.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectConfig {
    /// Job names in the subject.
    #[serde(default)]
    pub jobs: Vec<String>,

    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub notified: bool,
}
