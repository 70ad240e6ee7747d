// tests/integration/watchdog.rs

use chrono::{Duration, NaiveDateTime};

use jobflow::clock::Clock;
use jobflow::model::{Approval, Build, JobStatus};
use jobflow::store::Repository;
use jobflow::types::{BuildStatus, Flow, Phase, Scope};

use crate::common::builders::JobBuilder;
use crate::common::{graph_of, init_tracing, TestEngine};

fn pipeline() -> TestEngine {
    TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "extract").build(),
        JobBuilder::new(2, "load").parent(1, Scope::Full).build(),
    ]))
}

/// Record a successful build of `name` without running the push.
fn finished_silently(harness: &TestEngine, name: &str) {
    let now = harness.clock.now();
    let build = Build {
        number: 1,
        phase: Phase::Finalized,
        status: BuildStatus::Success,
        date: now,
    };
    let mut status = JobStatus::new(now);
    status.build = Some(build.clone());
    harness
        .repository
        .record_build(harness.id(name), build, Some(status))
        .expect("record");
}

fn extract_finished_silently(harness: &TestEngine) {
    finished_silently(harness, "extract");
}

/// Record a build phase of `load`. With `flow`, the status is replaced too,
/// stamped at the current time.
fn load_build(
    harness: &TestEngine,
    number: u64,
    phase: Phase,
    date: NaiveDateTime,
    flow: Option<Flow>,
) {
    let build = Build {
        number,
        phase,
        status: if phase == Phase::Finalized {
            BuildStatus::Success
        } else {
            BuildStatus::Running
        },
        date,
    };
    let status = flow.map(|flow| {
        let mut status = JobStatus::new(harness.clock.now());
        status.flow = flow;
        status.build = Some(build.clone());
        status
    });
    harness
        .repository
        .record_build(harness.id("load"), build, status)
        .expect("record");
}

/// `extract` succeeds while `load` sits in the build queue; the build of
/// `load` never reports back.
async fn lost_load_build(harness: &TestEngine) {
    harness.server.set_in_queue("load", true);
    harness.succeed("extract", 1).await.expect("observe");
    harness.server.set_in_queue("load", false);
    assert_eq!(harness.flow("load"), Some(Flow::Rebuild));
}

#[tokio::test]
async fn catches_a_job_waiting_on_settled_parents() {
    init_tracing();
    let harness = pipeline();
    extract_finished_silently(&harness);
    harness.clock.advance(Duration::minutes(31));

    let report = harness.engine.sweep().await;
    harness.drain().await;

    assert_eq!(report.inspected, 2);
    assert_eq!(report.caught, vec![harness.id("load")]);
    assert!(report.failed.is_empty());
    assert_eq!(harness.server.triggered(), vec!["load".to_string()]);
    assert_eq!(harness.flow("load"), Some(Flow::Queued));
    assert!(harness.notifier.contains(":dog: The watchdog caught job *load*"));
}

#[tokio::test]
async fn waiting_job_gets_a_grace_period() {
    init_tracing();
    let harness = pipeline();
    extract_finished_silently(&harness);
    harness.clock.advance(Duration::minutes(10));

    let report = harness.engine.sweep().await;

    assert!(report.caught.is_empty());
    assert!(harness.server.triggered().is_empty());
}

#[tokio::test]
async fn catches_a_lost_build() {
    init_tracing();
    let harness = pipeline();
    lost_load_build(&harness).await;
    harness.clock.advance(Duration::minutes(31));

    let report = harness.engine.sweep().await;

    assert_eq!(report.caught, vec![harness.id("load")]);
    assert_eq!(harness.server.trigger_count("load"), 1);
    assert_eq!(harness.flow("load"), Some(Flow::Queued));
}

#[tokio::test]
async fn lost_build_grace_runs_from_the_build_date() {
    init_tracing();
    let harness = pipeline();
    let now = harness.clock.now();
    // Status touched just now, build started 40 minutes ago.
    let started = now - Duration::minutes(40);
    load_build(&harness, 1, Phase::Started, started, Some(Flow::Rebuild));

    let report = harness.engine.sweep().await;

    assert_eq!(report.caught, vec![harness.id("load")]);
    assert_eq!(harness.server.trigger_count("load"), 1);
}

#[tokio::test]
async fn lost_build_grace_stretches_to_the_last_build_duration() {
    init_tracing();
    let harness = pipeline();
    let start = harness.clock.now();
    load_build(&harness, 1, Phase::Started, start - Duration::hours(4), None);
    load_build(&harness, 1, Phase::Finalized, start - Duration::hours(2), None);
    load_build(&harness, 2, Phase::Started, start, Some(Flow::Rebuild));

    harness.clock.advance(Duration::minutes(45));
    let report = harness.engine.sweep().await;
    assert!(report.caught.is_empty());

    harness.clock.advance(Duration::minutes(76));
    let report = harness.engine.sweep().await;
    assert_eq!(report.caught, vec![harness.id("load")]);
}

#[tokio::test]
async fn leaves_running_builds_alone() {
    init_tracing();
    let harness = pipeline();
    lost_load_build(&harness).await;
    harness.server.set_building("load", true);
    harness.clock.advance(Duration::minutes(31));

    let report = harness.engine.sweep().await;

    assert!(report.caught.is_empty());
    assert!(report.failed.is_empty());
    assert!(harness.server.triggered().is_empty());
}

#[tokio::test]
async fn unreachable_server_skips_lost_build_detection() {
    init_tracing();
    let harness = pipeline();
    lost_load_build(&harness).await;
    harness.server.set_unreachable(true);
    harness.clock.advance(Duration::minutes(31));

    let report = harness.engine.sweep().await;

    assert!(report.caught.is_empty());
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn failed_catch_is_reported_and_notified() {
    init_tracing();
    let harness = pipeline();
    lost_load_build(&harness).await;
    harness.server.fail("load");
    harness.clock.advance(Duration::minutes(31));

    let report = harness.engine.sweep().await;
    harness.drain().await;

    assert!(report.caught.is_empty());
    assert_eq!(report.failed, vec![harness.id("load")]);
    assert_eq!(harness.flow("load"), Some(Flow::Error));
    assert!(harness.notifier.contains(":hotdog: The watchdog failed building *load*"));
}

#[tokio::test]
async fn waiting_job_with_only_optional_or_disabled_parents_is_left_alone() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "extract").build(),
        JobBuilder::new(2, "archive").disabled().build(),
        JobBuilder::new(3, "load")
            .parent(1, Scope::Optional)
            .parent(2, Scope::Full)
            .build(),
    ]));
    finished_silently(&harness, "extract");
    finished_silently(&harness, "archive");
    harness.clock.advance(Duration::minutes(31));

    let report = harness.engine.sweep().await;

    assert_eq!(report.inspected, 2);
    assert!(report.caught.is_empty());
    assert!(report.failed.is_empty());
    assert!(harness.server.triggered().is_empty());
}

#[tokio::test]
async fn disabled_jobs_are_not_inspected() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "extract").build(),
        JobBuilder::new(2, "load").parent(1, Scope::Full).disabled().build(),
    ]));
    extract_finished_silently(&harness);
    harness.clock.advance(Duration::hours(2));

    let report = harness.engine.sweep().await;

    assert_eq!(report.inspected, 1);
    assert!(harness.server.triggered().is_empty());
}

#[tokio::test]
async fn sweep_purges_old_approvals() {
    init_tracing();
    let harness = pipeline();
    let load = harness.id("load");
    let now = harness.clock.now();
    for (days, username) in [(40, "old"), (5, "recent")] {
        harness
            .repository
            .save_approval(Approval {
                job: load,
                approved: true,
                description: String::new(),
                username: username.to_string(),
                date: now - Duration::days(days),
            })
            .expect("save approval");
    }

    let report = harness.engine.sweep().await;

    assert_eq!(report.purged, 1);
    let remaining = harness.repository.approvals(load);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].username, "recent");
}
