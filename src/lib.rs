// src/lib.rs

pub mod cli;
pub mod clock;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod flow;
pub mod http;
pub mod logging;
pub mod model;
pub mod schedule;
pub mod store;
pub mod types;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::clock::SystemClock;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::DependencyGraph;
use crate::engine::{Collaborators, Engine, Runtime, TaskSender, Ticker};
use crate::exec::{JenkinsClient, Notifier, ShellProbe, SlackNotifier, TracingNotifier};
use crate::model::JobId;
use crate::schedule::Schedule;
use crate::store::MemoryRepository;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the job graph
/// - the engine and its collaborators
/// - the runtime (task queue, workers, watchdog and subject tickers)
/// - the webhook endpoint
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let graph = DependencyGraph::from_config(&cfg).context("building job graph")?;
    let subjects = graph
        .subjects_from_config(&cfg)
        .context("resolving subjects")?;

    if args.dry_run {
        print_dry_run(&cfg, &graph);
        return Ok(());
    }

    let (tasks, task_rx) = TaskSender::channel(cfg.engine.queue_length);
    let engine = Arc::new(
        Engine::new(graph, collaborators(&cfg)?, cfg.engine.settings(), tasks)
            .with_subjects(subjects),
    );
    let shutdown = CancellationToken::new();

    if args.once {
        info!("running a single watchdog sweep");
        let report = engine.sweep().await;
        debug!(?report, "sweep report");
        Runtime::new(engine, task_rx, cfg.engine.workers, None, shutdown)
            .drain()
            .await?;
        return Ok(());
    }

    // Ctrl-C → graceful shutdown.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            shutdown.cancel();
        });
    }

    let watchdog = Schedule::parse(&cfg.engine.watchdog)?;
    let mut runtime = Runtime::new(
        Arc::clone(&engine),
        task_rx,
        cfg.engine.workers,
        Some(watchdog),
        shutdown.clone(),
    );
    if engine.subjects().iter().any(|subject| subject.notified) {
        let summaries = Schedule::parse(&cfg.engine.subject_summary)?;
        runtime = runtime.with_ticker(Ticker::subject_summary(summaries));
    }

    let serve_shutdown = shutdown.clone();
    let served = async {
        let result = http::serve(&cfg.http.bind, Arc::clone(&engine), serve_shutdown).await;
        // Stop the runtime once the listener ends.
        shutdown.cancel();
        result
    };

    tokio::try_join!(runtime.run(), served)?;
    Ok(())
}

fn collaborators(cfg: &ConfigFile) -> Result<Collaborators> {
    let server = JenkinsClient::new(&cfg.server).context("configuring build server")?;
    let probe = ShellProbe::new(&cfg.engine.sandbox, cfg.engine.command_timeout());

    let notifier: Arc<dyn Notifier> = match cfg.notify.slack_webhook.as_deref() {
        Some(webhook) => Arc::new(
            SlackNotifier::new(webhook, cfg.notify.default_channel.clone())
                .context("configuring slack notifier")?,
        ),
        None => Arc::new(TracingNotifier),
    };

    Ok(Collaborators {
        repository: Arc::new(MemoryRepository::new()),
        server: Arc::new(server),
        probe: Arc::new(probe),
        notifier,
        clock: Arc::new(SystemClock),
    })
}

/// Print jobs, parents, checkups, mesh roots and propagation.
fn print_dry_run(cfg: &ConfigFile, graph: &DependencyGraph) {
    println!("jobflow dry-run");
    println!("  engine.watchdog = {}", cfg.engine.watchdog);
    println!("  engine.subject_summary = {}", cfg.engine.subject_summary);
    println!("  engine.workers = {}", cfg.engine.workers);
    println!("  engine.queue_length = {}", cfg.engine.queue_length);
    println!("  server = {} ({})", cfg.server.name, cfg.server.url);
    println!("  http.bind = {}", cfg.http.bind);
    println!();

    let names = |ids: &BTreeSet<JobId>| -> Vec<String> {
        ids.iter().map(|id| graph.name_of(*id)).collect()
    };

    println!("jobs ({}):", graph.len());
    for job in graph.jobs() {
        println!("  - {}{}", job.name, if job.enabled { "" } else { " (disabled)" });
        for edge in &job.parents {
            println!(
                "      parent: {} [{}{}]",
                graph.name_of(edge.parent),
                edge.scope,
                if edge.blocker { ", blocker" } else { "" }
            );
        }
        if let Some(window) = &job.time_restriction {
            println!("      time_restriction: {window}");
        }
        for checkup in &job.checkups {
            println!(
                "      checkup {}: {} {} {} -> {}{}",
                checkup.id,
                checkup.name,
                checkup.conditional,
                checkup.threshold,
                checkup.action,
                if checkup.prevalidation { " (pre)" } else { "" }
            );
        }

        let roots = graph.mesh_parents(job.id);
        if !roots.is_empty() && !(roots.len() == 1 && roots.contains(&job.id)) {
            println!("      mesh roots: {:?}", names(&roots));
        }
        let propagation = graph.propagation(job.id, false);
        if !propagation.is_empty() {
            println!("      propagation: {:?}", names(&propagation));
        }
    }

    if !cfg.subject.is_empty() {
        println!();
        println!("subjects ({}):", cfg.subject.len());
        for (name, subject) in &cfg.subject {
            println!(
                "  - {}{}: {:?}",
                name,
                if subject.notified { "" } else { " (not notified)" },
                subject.jobs
            );
        }
    }

    debug!("dry-run complete (nothing contacted)");
}
