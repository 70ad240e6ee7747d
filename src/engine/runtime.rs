// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::errors::{FlowError, Result};
use crate::schedule::Schedule;

use super::{Engine, Task, TaskSender};

pub const WATCHDOG_TICKER: &str = "watchdog";
pub const SUBJECT_TICKER: &str = "subject_summary";

/// A schedule that queues a task every time it fires.
#[derive(Debug, Clone)]
pub struct Ticker {
    pub label: &'static str,
    pub schedule: Schedule,
    pub task: Task,
}

impl Ticker {
    pub fn watchdog(schedule: Schedule) -> Self {
        Self {
            label: WATCHDOG_TICKER,
            schedule,
            task: Task::Sweep,
        }
    }

    pub fn subject_summary(schedule: Schedule) -> Self {
        Self {
            label: SUBJECT_TICKER,
            schedule,
            task: Task::SummarizeSubjects,
        }
    }
}

/// Executes queued [`Task`]s on a bounded pool of workers.
///
/// This is the async IO shell around [`Engine`]: it reads tasks from the
/// queue, runs each one on its own tokio task while a worker permit is
/// available, and drives the tickers. Each ticker runs on its own child of
/// the shutdown token.
pub struct Runtime {
    engine: Arc<Engine>,
    task_rx: mpsc::Receiver<Task>,
    workers: Arc<Semaphore>,
    tickers: Vec<(Ticker, CancellationToken)>,
    shutdown: CancellationToken,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tickers: Vec<(&str, &str)> = self
            .tickers
            .iter()
            .map(|(ticker, _)| (ticker.label, ticker.schedule.as_str()))
            .collect();
        f.debug_struct("Runtime")
            .field("workers", &self.workers.available_permits())
            .field("tickers", &tickers)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        engine: Arc<Engine>,
        task_rx: mpsc::Receiver<Task>,
        workers: usize,
        watchdog: Option<Schedule>,
        shutdown: CancellationToken,
    ) -> Self {
        let runtime = Self {
            engine,
            task_rx,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            tickers: Vec::new(),
            shutdown,
        };
        match watchdog {
            Some(schedule) => runtime.with_ticker(Ticker::watchdog(schedule)),
            None => runtime,
        }
    }

    pub fn with_ticker(mut self, ticker: Ticker) -> Self {
        let token = self.shutdown.child_token();
        self.tickers.push((ticker, token));
        self
    }

    /// Token that stops the ticker with `label` alone.
    pub fn ticker_token(&self, label: &str) -> Option<CancellationToken> {
        self.tickers
            .iter()
            .find(|(ticker, _)| ticker.label == label)
            .map(|(_, token)| token.clone())
    }

    /// Main loop. Runs until the shutdown token is cancelled, then waits for
    /// in-flight tasks.
    pub async fn run(mut self) -> Result<()> {
        info!("jobflow runtime started");

        let tickers: Vec<_> = std::mem::take(&mut self.tickers)
            .into_iter()
            .map(|(ticker, token)| {
                tokio::spawn(run_ticker(
                    ticker,
                    Arc::clone(self.engine.clock()),
                    self.engine.tasks().clone(),
                    token,
                ))
            })
            .collect();

        let mut inflight = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested; stopping runtime");
                    break;
                }
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    log_join(joined);
                }
                task = self.task_rx.recv() => match task {
                    Some(task) => self.dispatch(task, &mut inflight).await?,
                    None => {
                        info!("task queue closed; exiting");
                        break;
                    }
                },
            }
        }

        while let Some(joined) = inflight.join_next().await {
            log_join(joined);
        }
        for ticker in tickers {
            ticker.abort();
        }

        info!("runtime exiting");
        Ok(())
    }

    /// Run every queued task, including the ones queued along the way, and
    /// return once the queue is empty and no task is running.
    pub async fn drain(mut self) -> Result<()> {
        let mut inflight = JoinSet::new();
        loop {
            match self.task_rx.try_recv() {
                Ok(task) => self.dispatch(task, &mut inflight).await?,
                Err(TryRecvError::Empty) => match inflight.join_next().await {
                    Some(joined) => log_join(joined),
                    None => break,
                },
                Err(TryRecvError::Disconnected) => {
                    while let Some(joined) = inflight.join_next().await {
                        log_join(joined);
                    }
                    break;
                }
            }
        }

        debug!("task queue drained");
        Ok(())
    }

    async fn dispatch(&self, task: Task, inflight: &mut JoinSet<()>) -> Result<()> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| FlowError::Other(anyhow::anyhow!("worker pool closed: {e}")))?;

        debug!(?task, "dispatching task");
        let engine = Arc::clone(&self.engine);
        inflight.spawn(async move {
            let _permit = permit;
            engine.run_task(task).await;
        });
        Ok(())
    }
}

/// Enqueue the ticker's task every time its schedule fires.
async fn run_ticker(
    ticker: Ticker,
    clock: Arc<dyn Clock>,
    tasks: TaskSender,
    shutdown: CancellationToken,
) {
    let Ticker {
        label,
        schedule,
        task,
    } = ticker;
    info!(ticker = label, schedule = %schedule, "ticker started");

    loop {
        let now = clock.now();
        let Some(next) = schedule.next_after(now) else {
            warn!(ticker = label, schedule = %schedule, "schedule never fires; ticker stopped");
            return;
        };
        let delay = (next - now).to_std().unwrap_or_default();
        debug!(ticker = label, next = %next, "next tick");

        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(ticker = label, "ticker cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {
                tasks.submit(task.clone());
            }
        }
    }
}

fn log_join(joined: std::result::Result<(), JoinError>) {
    if let Err(err) = joined {
        warn!(error = %err, "task panicked or was cancelled");
    }
}
