// tests/integration/approval.rs

use jobflow::engine::Observation;
use jobflow::errors::FlowError;
use jobflow::model::Actor;
use jobflow::store::Repository;
use jobflow::types::{Action, Conditional, Flow, Role, Scope};

use crate::common::builders::{CheckupBuilder, JobBuilder};
use crate::common::{graph_of, init_tracing, TestEngine};

fn user(name: &str) -> Actor {
    Actor::new(name, [Role::User])
}

/// `load` fails its post-validation; `report` depends on it.
async fn unhealthy_load() -> TestEngine {
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "load")
            .retry(2)
            .approver("olivia", None)
            .checkup(
                CheckupBuilder::new(1, "rows")
                    .threshold(Conditional::GreaterThan, "100")
                    .action(Action::Abort)
                    .build(),
            )
            .build(),
        JobBuilder::new(2, "report").parent(1, Scope::Full).build(),
    ]));
    harness.probe.set_value(1, "42");
    let observation = harness.succeed("load", 1).await.expect("observe");
    assert_eq!(observation, Observation::Unhealthy);
    harness
}

/// `load` is BLOCKED by a failing pre-validation.
async fn blocked_load() -> TestEngine {
    let harness = TestEngine::new(graph_of(vec![
        JobBuilder::new(1, "extract").build(),
        JobBuilder::new(2, "load")
            .parent(1, Scope::Full)
            .checkup(
                CheckupBuilder::new(1, "source ready")
                    .threshold(Conditional::Equal, "1")
                    .prevalidation()
                    .build(),
            )
            .build(),
    ]));
    harness.probe.set_value(1, "0");
    harness.succeed("extract", 1).await.expect("observe");
    assert_eq!(harness.flow("load"), Some(Flow::Blocked));
    harness
}

#[tokio::test]
async fn plain_users_cannot_approve_jobs_they_do_not_own() {
    init_tracing();
    let harness = unhealthy_load().await;
    let load = harness.id("load");

    let err = harness
        .engine
        .decide(load, &user("mallory"), true, "looks fine")
        .await
        .expect_err("denied");

    assert!(matches!(err, FlowError::ApprovalDenied { ref user, .. } if user == "mallory"));
    assert_eq!(harness.flow("load"), Some(Flow::Unhealthy));
    assert!(harness.repository.approvals(load).is_empty());
}

#[tokio::test]
async fn nobody_decides_on_a_job_that_is_not_waiting() {
    init_tracing();
    let harness = TestEngine::new(graph_of(vec![JobBuilder::new(1, "load").build()]));
    harness.succeed("load", 1).await.expect("observe");
    let admin = Actor::new("root", [Role::Admin]);

    let job = harness.engine.job(harness.id("load")).expect("job");
    assert!(!harness.engine.has_approval_right(&job, &admin));

    let err = harness
        .engine
        .decide(job.id, &admin, true, "")
        .await
        .expect_err("not awaiting approval");
    assert!(matches!(err, FlowError::ApprovalDenied { .. }));
}

#[tokio::test]
async fn approver_releases_an_unhealthy_job_to_its_children() {
    init_tracing();
    let harness = unhealthy_load().await;
    let load = harness.id("load");
    assert_eq!(harness.server.trigger_count("report"), 0);

    let flow = harness
        .engine
        .decide(load, &user("olivia"), true, "row count is expected today")
        .await
        .expect("approve");

    assert_eq!(flow, Flow::Approved);
    assert_eq!(harness.flow("load"), Some(Flow::Approved));
    assert_eq!(harness.server.trigger_count("report"), 1);
    assert_eq!(harness.flow("report"), Some(Flow::Queued));
    assert!(harness.engine.tracker().warnings(harness.id("report")).is_empty());

    let approvals = harness.repository.approvals(load);
    assert_eq!(approvals.len(), 1);
    assert!(approvals[0].approved);
    assert_eq!(approvals[0].username, "olivia");
    assert_eq!(approvals[0].description, "row count is expected today");
}

#[tokio::test]
async fn disapproval_stops_the_flow() {
    init_tracing();
    let harness = unhealthy_load().await;
    let load = harness.id("load");
    let hero = Actor::new("hana", [Role::Hero]);

    let flow = harness
        .engine
        .decide(load, &hero, false, "bad data")
        .await
        .expect("disapprove");

    assert_eq!(flow, Flow::Disapproved);
    assert_eq!(harness.flow("load"), Some(Flow::Disapproved));
    assert_eq!(harness.server.trigger_count("report"), 0);
    assert!(!harness.engine.retries().exists(load));
    assert!(!harness.repository.approvals(load)[0].approved);

    // The decision is final until the job fails again.
    let again = harness.engine.decide(load, &hero, true, "").await;
    assert!(matches!(again, Err(FlowError::ApprovalDenied { .. })));
}

#[tokio::test]
async fn approving_a_blocked_job_triggers_it() {
    init_tracing();
    let harness = blocked_load().await;
    assert_eq!(harness.server.trigger_count("load"), 0);
    let admin = Actor::new("root", [Role::Admin]);

    let flow = harness
        .engine
        .decide(harness.id("load"), &admin, true, "source checked by hand")
        .await
        .expect("approve");

    assert_eq!(flow, Flow::Approved);
    assert_eq!(harness.server.trigger_count("load"), 1);
    assert_eq!(harness.flow("load"), Some(Flow::Rebuild));
}

#[tokio::test]
async fn refused_approved_build_leaves_the_job_errored() {
    init_tracing();
    let harness = blocked_load().await;
    harness.server.refuse("load");
    let admin = Actor::new("root", [Role::Admin]);

    harness
        .engine
        .decide(harness.id("load"), &admin, true, "")
        .await
        .expect("decision stands");

    assert_eq!(harness.flow("load"), Some(Flow::Error));
}

#[tokio::test]
async fn failing_approved_build_is_reported() {
    init_tracing();
    let harness = blocked_load().await;
    harness.server.fail("load");
    let admin = Actor::new("root", [Role::Admin]);

    let err = harness
        .engine
        .decide(harness.id("load"), &admin, true, "")
        .await
        .expect_err("trigger failure");

    assert!(matches!(err, FlowError::TriggerFailure { .. }));
    assert_eq!(harness.flow("load"), Some(Flow::Error));
    assert_eq!(harness.repository.approvals(harness.id("load")).len(), 1);
}
