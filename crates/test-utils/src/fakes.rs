use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use jobflow::errors::{FlowError, Result};
use jobflow::exec::{BoxFuture, BuildServer, CommandOutcome, Notification, Notifier, Probe};
use jobflow::model::{Checkup, CheckupId, Command};

pub use jobflow::clock::FakeClock;

/// A fake build server that:
/// - records every trigger call
/// - accepts builds unless told to refuse or fail them
/// - reports queue/building state from sets the test controls.
#[derive(Debug, Default)]
pub struct FakeBuildServer {
    triggered: Mutex<Vec<String>>,
    refused: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    in_queue: Mutex<HashSet<String>>,
    building: Mutex<HashSet<String>>,
    unbuildable: Mutex<HashSet<String>>,
    unreachable: Mutex<bool>,
}

impl FakeBuildServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every job triggered so far, in order.
    pub fn triggered(&self) -> Vec<String> {
        self.triggered.lock().clone()
    }

    pub fn trigger_count(&self, job: &str) -> usize {
        self.triggered.lock().iter().filter(|name| *name == job).count()
    }

    pub fn clear_triggered(&self) {
        self.triggered.lock().clear();
    }

    /// Make `trigger(job)` return `Ok(false)`.
    pub fn refuse(&self, job: &str) {
        self.refused.lock().insert(job.to_string());
    }

    /// Make `trigger(job)` return an error.
    pub fn fail(&self, job: &str) {
        self.failing.lock().insert(job.to_string());
    }

    pub fn set_in_queue(&self, job: &str, queued: bool) {
        toggle(&self.in_queue, job, queued);
    }

    pub fn set_building(&self, job: &str, building: bool) {
        toggle(&self.building, job, building);
    }

    pub fn set_unbuildable(&self, job: &str) {
        self.unbuildable.lock().insert(job.to_string());
    }

    /// Make every query method fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock() = unreachable;
    }

    fn check_reachable(&self) -> Result<()> {
        if *self.unreachable.lock() {
            return Err(FlowError::Other(anyhow::anyhow!("build server unreachable")));
        }
        Ok(())
    }
}

fn toggle(set: &Mutex<HashSet<String>>, job: &str, on: bool) {
    let mut set = set.lock();
    if on {
        set.insert(job.to_string());
    } else {
        set.remove(job);
    }
}

impl BuildServer for FakeBuildServer {
    fn trigger<'a>(&'a self, job: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.triggered.lock().push(job.to_string());
            if self.failing.lock().contains(job) {
                return Err(FlowError::Other(anyhow::anyhow!("connection refused")));
            }
            Ok(!self.refused.lock().contains(job))
        })
    }

    fn is_in_queue<'a>(&'a self, job: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.in_queue.lock().contains(job))
        })
    }

    fn is_building<'a>(&'a self, job: &'a str, _number: u64) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.check_reachable()?;
            Ok(self.building.lock().contains(job) || self.in_queue.lock().contains(job))
        })
    }

    fn is_buildable<'a>(
        &'a self,
        name: &'a str,
        target: Option<&'a str>,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.check_reachable()?;
            let other_server = target.is_some_and(|target| target != "default");
            Ok(!other_server && !self.unbuildable.lock().contains(name))
        })
    }
}

/// A fake probe with scripted query values.
///
/// Each checkup answers from its queue of values; the last value repeats.
/// Checkups without values fail their query.
#[derive(Debug, Default)]
pub struct FakeProbe {
    values: Mutex<HashMap<CheckupId, VecDeque<String>>>,
    queries: Mutex<Vec<CheckupId>>,
    executed: Mutex<Vec<String>>,
    failing_commands: Mutex<HashSet<String>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every query of `checkup` with `value`.
    pub fn set_value(&self, checkup: u64, value: &str) {
        self.set_values(checkup, &[value]);
    }

    /// Answer successive queries with `values`, repeating the last one.
    pub fn set_values(&self, checkup: u64, values: &[&str]) {
        self.values.lock().insert(
            CheckupId(checkup),
            values.iter().map(|v| v.to_string()).collect(),
        );
    }

    pub fn fail_command(&self, command: &str) {
        self.failing_commands.lock().insert(command.to_string());
    }

    pub fn query_count(&self, checkup: u64) -> usize {
        self.queries
            .lock()
            .iter()
            .filter(|id| **id == CheckupId(checkup))
            .count()
    }

    /// Commands executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

impl Probe for FakeProbe {
    fn query<'a>(&'a self, checkup: &'a Checkup) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.queries.lock().push(checkup.id);
            let mut values = self.values.lock();
            let queue = values
                .get_mut(&checkup.id)
                .ok_or_else(|| FlowError::CheckupExecution {
                    checkup: checkup.id.0,
                    reason: "no scripted value".to_string(),
                })?;
            let value = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            value.ok_or_else(|| FlowError::CheckupExecution {
                checkup: checkup.id.0,
                reason: "no scripted value".to_string(),
            })
        })
    }

    fn execute<'a>(
        &'a self,
        _checkup: &'a Checkup,
        command: &'a Command,
    ) -> BoxFuture<'a, Result<CommandOutcome>> {
        Box::pin(async move {
            self.executed.lock().push(command.command.clone());
            let success = !self.failing_commands.lock().contains(&command.command);
            Ok(CommandOutcome {
                success,
                output: format!("ran {}", command.command),
            })
        })
    }
}

/// A notifier that keeps every notification it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Whether any notification text contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.sent.lock().iter().any(|n| n.text.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn send<'a>(&'a self, notification: &'a Notification) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.sent.lock().push(notification.clone());
            Ok(())
        })
    }
}
