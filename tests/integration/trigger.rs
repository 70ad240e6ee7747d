// tests/integration/trigger.rs

use chrono::Duration;

use jobflow::clock::Clock;
use jobflow::engine::TriggerOutcome;
use jobflow::errors::FlowError;
use jobflow::model::JobStatus;
use jobflow::types::{Action, Conditional, Flow, Scope};

use crate::common::builders::{CheckupBuilder, JobBuilder};
use crate::common::{graph_of, init_tracing, TestEngine};

fn single(job: JobBuilder) -> TestEngine {
    TestEngine::new(graph_of(vec![job.build()]))
}

#[tokio::test]
async fn second_trigger_within_the_window_is_deduplicated() {
    init_tracing();
    let harness = single(JobBuilder::new(1, "load"));
    let job = harness.engine.job(harness.id("load")).expect("job");

    let first = harness.engine.trigger_job(&job).await.expect("first");
    harness.clock.advance(Duration::seconds(5));
    let second = harness.engine.trigger_job(&job).await.expect("second");

    assert_eq!(first, TriggerOutcome::Triggered);
    assert_eq!(second, TriggerOutcome::Deduplicated);
    assert_eq!(harness.server.trigger_count("load"), 1);

    harness.clock.advance(Duration::seconds(6));
    let third = harness.engine.trigger_job(&job).await.expect("third");
    assert_eq!(third, TriggerOutcome::Triggered);
    assert_eq!(harness.server.trigger_count("load"), 2);
}

#[tokio::test]
async fn queued_job_is_left_alone_without_taking_the_lock() {
    init_tracing();
    let harness = single(JobBuilder::new(1, "load"));
    let job = harness.engine.job(harness.id("load")).expect("job");
    harness.server.set_in_queue("load", true);

    let outcome = harness.engine.trigger_job(&job).await.expect("in queue");
    assert_eq!(outcome, TriggerOutcome::InQueue);
    assert!(harness.server.triggered().is_empty());

    harness.server.set_in_queue("load", false);
    let outcome = harness.engine.trigger_job(&job).await.expect("trigger");
    assert_eq!(outcome, TriggerOutcome::Triggered);
}

#[tokio::test]
async fn unreachable_server_is_a_trigger_failure() {
    init_tracing();
    let harness = single(JobBuilder::new(1, "load"));
    let job = harness.engine.job(harness.id("load")).expect("job");
    harness.server.set_unreachable(true);

    let err = harness.engine.trigger_job(&job).await.expect_err("unreachable");

    assert!(matches!(err, FlowError::TriggerFailure { ref job, .. } if job == "load"), "{err}");
    assert!(harness.server.triggered().is_empty());
}

#[tokio::test]
async fn refused_trigger_marks_the_job_errored() {
    init_tracing();
    let harness = single(JobBuilder::new(1, "load").notify("#etl"));
    let job = harness.engine.job(harness.id("load")).expect("job");
    harness.server.refuse("load");

    let err = harness.engine.trigger_job(&job).await.expect_err("refused");
    harness.drain().await;

    assert!(matches!(err, FlowError::TriggerFailure { .. }));
    let status = harness.status("load").expect("status");
    assert_eq!(status.flow, Flow::Error);
    assert_eq!(status.failure_timestamp, Some(harness.clock.now()));
    assert!(harness.notifier.contains("Something wrong happened to the job *load*"));
}

#[tokio::test]
async fn server_error_marks_the_job_errored() {
    init_tracing();
    let harness = single(JobBuilder::new(1, "load"));
    let job = harness.engine.job(harness.id("load")).expect("job");
    harness.server.fail("load");

    let err = harness.engine.trigger_job(&job).await.expect_err("failing");

    match err {
        FlowError::TriggerFailure { job, reason } => {
            assert_eq!(job, "load");
            assert!(reason.contains("connection refused"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.flow("load"), Some(Flow::Error));
}

#[tokio::test]
async fn prevalidation_runs_at_the_status_scope() {
    init_tracing();
    let harness = single(
        JobBuilder::new(1, "load").checkup(
            CheckupBuilder::new(1, "source ready")
                .threshold(Conditional::Equal, "1")
                .action(Action::Abort)
                .prevalidation()
                .build(),
        ),
    );
    harness.probe.set_value(1, "0");
    let id = harness.id("load");
    let job = harness.engine.job(id).expect("job");

    let mut status = JobStatus::new(harness.clock.now());
    status.scope = Scope::Partial;
    harness.engine.save_status(id, status).expect("save");

    let outcome = harness.engine.trigger_job(&job).await.expect("partial");
    assert_eq!(outcome, TriggerOutcome::Triggered);
    assert_eq!(harness.probe.query_count(1), 0);

    harness.clock.advance(Duration::seconds(11));
    let mut status = harness.status("load").expect("status");
    status.scope = Scope::Full;
    harness.engine.save_status(id, status).expect("save");

    let outcome = harness.engine.trigger_job(&job).await.expect("full");
    assert_eq!(outcome, TriggerOutcome::Blocked);
    assert_eq!(harness.probe.query_count(1), 1);
    assert_eq!(harness.flow("load"), Some(Flow::Blocked));
    assert_eq!(harness.server.trigger_count("load"), 1);
}

#[tokio::test]
async fn blocked_job_warns_its_dependents() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "load")
            .checkup(
                CheckupBuilder::new(1, "source ready")
                    .threshold(Conditional::Equal, "1")
                    .prevalidation()
                    .build(),
            )
            .build(),
        JobBuilder::new(2, "report").parent(1, Scope::Full).build(),
    ]));
    harness.probe.set_value(1, "0");
    let job = harness.engine.job(harness.id("load")).expect("job");

    let outcome = harness.engine.trigger_job(&job).await.expect("blocked");

    assert_eq!(outcome, TriggerOutcome::Blocked);
    assert!(harness
        .engine
        .tracker()
        .warnings(harness.id("report"))
        .contains(&harness.id("load")));
}
