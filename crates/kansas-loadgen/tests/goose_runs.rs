//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "tests"
//! kansas_type: "source"
//! kansas_scope: "test"
//! kansas_description: "Short goose runs of both scenarios against the fake server."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use std::time::Duration;

use kansas_common::AppConfig;
use kansas_fake_tornado::{FakeTornadoBuilder, FakeTornadoHandle, RegistrationMode};
use kansas_loadgen::register_poll::poll_name_template;
use kansas_loadgen::{run, Credentials, RegisterPollOptions, ScenarioKind};
use kansas_metrics::{new_registry, LoadgenMetrics};

const USERS: usize = 2;

async fn fake_server(mode: RegistrationMode) -> FakeTornadoHandle {
    FakeTornadoBuilder::new("127.0.0.1:0".parse().unwrap())
        .with_sleep(Duration::from_millis(100))
        .with_registration_mode(mode)
        .require_authorization("Basic YUBiLmNvbTpLRVk=")
        .spawn()
        .await
        .expect("spawn fake tornado")
}

fn config(server: &FakeTornadoHandle) -> AppConfig {
    let mut config = AppConfig::default();
    config.target.host = server.base_url();
    config.load.users = USERS;
    config.load.hatch_rate = USERS.to_string();
    config.load.run_time = Duration::from_secs(2);
    config.load.wait_time_min = Some(Duration::from_millis(50));
    config.load.wait_time_max = Some(Duration::from_millis(100));
    config.load.halted_idle = Duration::from_millis(200);
    config
}

fn register_poll() -> ScenarioKind {
    ScenarioKind::RegisterPoll(RegisterPollOptions {
        credentials: Credentials::from_parts(Some("a@b.com".into()), Some("KEY".into())),
        block: false,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registered_users_poll_their_own_queue() {
    kansas_logging::init();
    let server = fake_server(RegistrationMode::Success).await;
    let metrics = LoadgenMetrics::new(new_registry()).unwrap();

    let report = run(&config(&server), register_poll(), metrics.clone())
        .await
        .unwrap();
    let summary = report.summary;

    let stats = server.stats();
    assert_eq!(stats.registrations, USERS as u64);
    assert_eq!(
        stats.last_authorization.as_deref(),
        Some("Basic YUBiLmNvbTpLRVk=")
    );
    assert_eq!(stats.polls.len(), USERS);
    assert!(stats.polls.keys().all(|queue| queue.ends_with(":1")));

    assert_eq!(summary.registrations_ok, USERS as u64);
    assert_eq!(summary.halted, 0);
    assert!(summary.polls_ok > 0);
    assert_eq!(summary.polls_failed, 0);
    assert_eq!(summary.idle_ticks, 0);

    let polls: Vec<_> = report.harness.requests_for("GET").collect();
    assert_eq!(polls.len(), 1, "{:?}", report.harness.requests);
    assert_eq!(polls[0].name, poll_name_template(false));
    assert_eq!(
        polls[0].name,
        "/json/events?queue_id=...&last_event_id=-1&dont_block=true"
    );
    assert_eq!(polls[0].fail_count, 0);
    let startup = report.harness.transaction("startup").unwrap();
    assert_eq!(startup.success_count, USERS);
    assert_eq!(startup.fail_count, 0);
    assert!(report.harness.errors.is_empty(), "{:?}", report.harness.errors);
    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_registration_halts_every_user() {
    kansas_logging::init();
    let server = fake_server(RegistrationMode::Reject(500)).await;
    let metrics = LoadgenMetrics::new(new_registry()).unwrap();

    let report = run(&config(&server), register_poll(), metrics)
        .await
        .unwrap();
    let summary = report.summary;

    let stats = server.stats();
    assert_eq!(stats.rejected_registrations, USERS as u64);
    assert_eq!(stats.total_polls(), 0);
    assert_eq!(summary.registrations_failed, USERS as u64);
    assert_eq!(summary.halted, USERS as u64);
    assert_eq!(summary.polls_ok + summary.polls_failed, 0);
    assert!(summary.idle_ticks > 0);

    let error = report
        .harness
        .error_containing("Bad registration status code response: 500")
        .unwrap_or_else(|| panic!("no registration error in {:?}", report.harness.errors));
    assert_eq!(error.name, "/api/v1/register");
    assert_eq!(report.harness.requests_for("GET").count(), 0);
    let startup = report.harness.transaction("startup").unwrap();
    assert_eq!(startup.fail_count, USERS);
    assert_eq!(startup.success_count, 0);
    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsuccessful_registration_halts_every_user() {
    kansas_logging::init();
    let server = fake_server(RegistrationMode::Unsuccessful).await;
    let metrics = LoadgenMetrics::new(new_registry()).unwrap();

    let report = run(&config(&server), register_poll(), metrics)
        .await
        .unwrap();

    assert_eq!(server.stats().total_polls(), 0);
    assert_eq!(report.summary.halted, USERS as u64);
    assert!(report
        .harness
        .error_containing("Unsuccessful registration")
        .is_some());
    assert_eq!(report.harness.transaction("startup").unwrap().fail_count, USERS);
    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn internal_event_users_poll_generated_queues() {
    kansas_logging::init();
    let server = fake_server(RegistrationMode::Success).await;
    let metrics = LoadgenMetrics::new(new_registry()).unwrap();

    let report = run(&config(&server), ScenarioKind::InternalEvents, metrics)
        .await
        .unwrap();
    let summary = report.summary;

    let stats = server.stats();
    assert_eq!(stats.registrations, 0);
    assert_eq!(stats.internal_events, USERS as u64);
    assert_eq!(stats.last_shard.as_deref(), Some("9800"));
    assert_eq!(stats.polls.len(), USERS);
    assert!(stats
        .polls
        .keys()
        .all(|queue| queue.len() == 32 && queue.chars().all(|c| c.is_ascii_hexdigit())));
    assert_eq!(summary.registrations_ok, USERS as u64);
    assert!(summary.polls_ok > 0);
    let polls: Vec<_> = report.harness.requests_for("GET").collect();
    assert_eq!(polls.len(), 1);
    assert_eq!(polls[0].name, "/json/events?queue_id=...&dont_block=true");
    server.shutdown().await.unwrap();
}
