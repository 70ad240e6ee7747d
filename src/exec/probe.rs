// src/exec/probe.rs

//! Checkup query and remediation command execution.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command as Process;
use tracing::{debug, info, warn};

use crate::errors::{FlowError, Result};
use crate::model::{Checkup, Command};
use crate::types::CommandKind;

use super::backend::BoxFuture;

/// Result of one remediation command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
}

/// Runs checkup queries and remediation commands.
pub trait Probe: Send + Sync {
    /// Run the checkup's query and return its value.
    fn query<'a>(&'a self, checkup: &'a Checkup) -> BoxFuture<'a, Result<String>>;

    /// Run one remediation command of `checkup`.
    fn execute<'a>(
        &'a self,
        checkup: &'a Checkup,
        command: &'a Command,
    ) -> BoxFuture<'a, Result<CommandOutcome>>;
}

/// Probe that runs queries and shell commands with `sh -c`.
///
/// Processes run in the sandbox directory and are killed once the timeout
/// elapses. A query's value is the first non-empty line it prints. SQL
/// commands are rejected since no database connection is configured.
#[derive(Debug, Clone)]
pub struct ShellProbe {
    sandbox: PathBuf,
    timeout: Duration,
}

struct Finished {
    success: bool,
    code: i32,
    stdout: String,
    stderr: String,
}

impl ShellProbe {
    pub fn new(sandbox: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            sandbox: sandbox.into(),
            timeout,
        }
    }

    async fn run(&self, checkup: &Checkup, script: &str) -> Result<Finished> {
        tokio::fs::create_dir_all(&self.sandbox).await?;

        let mut cmd = Process::new("sh");
        cmd.arg("-c")
            .arg(script.replace('\r', ""))
            .current_dir(&self.sandbox)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| FlowError::CheckupExecution {
            checkup: checkup.id.0,
            reason: format!("spawning shell: {e}"),
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(FlowError::CheckupExecution {
                    checkup: checkup.id.0,
                    reason: format!("timed out after {}s", self.timeout.as_secs()),
                });
            }
        };

        Ok(Finished {
            success: output.status.success(),
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_query(&self, checkup: &Checkup) -> Result<String> {
        let finished = self.run(checkup, &checkup.query).await?;

        if !finished.success {
            return Err(FlowError::CheckupExecution {
                checkup: checkup.id.0,
                reason: format!(
                    "query exited with code {}: {}",
                    finished.code,
                    finished.stderr.trim()
                ),
            });
        }

        let value = finished
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();

        debug!(checkup = %checkup.name, value = %value, "checkup query finished");
        Ok(value)
    }

    async fn run_command(&self, checkup: &Checkup, command: &Command) -> Result<CommandOutcome> {
        match command.kind {
            CommandKind::Sql => {
                warn!(checkup = %checkup.name, "sql command skipped: no database connection");
                Err(FlowError::CheckupExecution {
                    checkup: checkup.id.0,
                    reason: "sql commands require a database connection".to_string(),
                })
            }
            CommandKind::Shell => {
                let finished = self.run(checkup, &command.command).await?;

                info!(
                    checkup = %checkup.name,
                    exit_code = finished.code,
                    success = finished.success,
                    "remediation command exited"
                );

                let mut output = finished.stdout;
                output.push_str(&finished.stderr);

                Ok(CommandOutcome {
                    success: finished.success,
                    output,
                })
            }
        }
    }
}

impl Probe for ShellProbe {
    fn query<'a>(&'a self, checkup: &'a Checkup) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.run_query(checkup))
    }

    fn execute<'a>(
        &'a self,
        checkup: &'a Checkup,
        command: &'a Command,
    ) -> BoxFuture<'a, Result<CommandOutcome>> {
        Box::pin(self.run_command(checkup, command))
    }
}
