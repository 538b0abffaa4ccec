//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Goose scenario wiring and run orchestration."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::future::{BoxFuture, FutureExt};
use goose::config::GooseConfiguration;
use goose::prelude::*;
use kansas_common::AppConfig;
use kansas_logging::{kl_debug, kl_warn, log_user_event, LogContext, UserEventOutcome};
use kansas_metrics::{LoadgenMetrics, Outcome};
use tracing::info;

use crate::goose_driver::GooseDriver;
use crate::internal_events::{self, InternalEventsUser};
use crate::lifecycle::{Lifecycle, TickOutcome};
use crate::register_poll::{self, RegisterPollOptions, RegisterPollUser};
use crate::report::{HarnessReport, RunReport, RunSummary};
use crate::user::SimulatedUser;

/// Scenario selected at launch.
#[derive(Debug, Clone)]
pub enum ScenarioKind {
    RegisterPoll(RegisterPollOptions),
    InternalEvents,
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::RegisterPoll(_) => register_poll::SCENARIO,
            ScenarioKind::InternalEvents => internal_events::SCENARIO,
        }
    }

    /// Fresh, unstarted user for this scenario.
    pub fn new_user(&self) -> Box<dyn SimulatedUser> {
        match self {
            ScenarioKind::RegisterPoll(options) => Box::new(RegisterPollUser::new(options)),
            ScenarioKind::InternalEvents => Box::new(InternalEventsUser::new()),
        }
    }
}

/// State shared by every goose user of one run.
struct RunContext {
    kind: ScenarioKind,
    metrics: LoadgenMetrics,
    halted_idle: Duration,
}

fn boxed_transaction<F>(transaction: F) -> Transaction
where
    F: for<'r> Fn(&'r mut GooseUser) -> BoxFuture<'r, TransactionResult> + Send + Sync + 'static,
{
    Transaction::new(Arc::new(transaction))
}

fn log_context<'a>(
    scenario: &'a str,
    index: usize,
    lifecycle: &'a Lifecycle,
) -> LogContext<'a> {
    let ctx = LogContext::new()
        .with_scenario(scenario)
        .with_user(index)
        .with_phase(lifecycle.phase().as_str());
    match lifecycle.queue_id() {
        Some(queue_id) => ctx.with_queue_id(queue_id),
        None => ctx,
    }
}

/// Startup transaction: run the handshake and park the lifecycle in the
/// goose session. Fails with the rejected request when the user halts.
async fn start_user(goose_user: &mut GooseUser, run: Arc<RunContext>) -> TransactionResult {
    let index = goose_user.weighted_users_index;
    let scenario = run.kind.name();
    let mut lifecycle = Lifecycle::new(run.kind.new_user());

    let (started, failure) = {
        let mut driver = GooseDriver::new(goose_user);
        let started = lifecycle.start(&mut driver).await;
        (started, driver.take_failure())
    };

    let ctx = log_context(scenario, index, &lifecycle);
    let result = match started {
        Ok(()) => {
            run.metrics.record_registration(scenario, Outcome::Success);
            log_user_event(
                Some(&ctx),
                "user.started",
                "startup handshake complete",
                UserEventOutcome::Success,
            );
            Ok(())
        }
        Err(err) => {
            run.metrics.record_registration(scenario, Outcome::Failure);
            run.metrics.record_halt(scenario);
            log_user_event(
                Some(&ctx),
                "user.halted",
                &err.to_string(),
                UserEventOutcome::Fault,
            );
            match failure {
                Some(failure) => Err(failure),
                None => {
                    kl_warn!(context = ctx, "halted without a failed request to report");
                    Ok(())
                }
            }
        }
    };

    goose_user.set_session_data(Arc::new(lifecycle));
    result
}

/// Idle tick of a halted user: no request, counted apart from polls.
async fn idle(run: &RunContext) {
    run.metrics.record_idle(run.kind.name());
    tokio::time::sleep(run.halted_idle).await;
}

/// Polling transaction. Halted users issue no request and idle instead.
async fn poll_user(goose_user: &mut GooseUser, run: Arc<RunContext>) -> TransactionResult {
    let scenario = run.kind.name();
    let Some(lifecycle) = goose_user.get_session_data::<Arc<Lifecycle>>().cloned() else {
        idle(&run).await;
        return Ok(());
    };
    let index = goose_user.weighted_users_index;

    let outcome = {
        let mut driver = GooseDriver::new(goose_user);
        lifecycle.tick(&mut driver).await
    };

    match outcome {
        TickOutcome::Skipped => idle(&run).await,
        TickOutcome::Polled(sample) => {
            run.metrics
                .record_poll(scenario, Outcome::from_success(sample.is_success()));
            if !sample.is_success() {
                kl_debug!(
                    context = log_context(scenario, index, &lifecycle),
                    "poll failed with status {}",
                    sample.status
                );
            }
        }
        TickOutcome::Failed(err) => {
            run.metrics.record_poll(scenario, Outcome::Failure);
            kl_warn!(
                context = log_context(scenario, index, &lifecycle),
                "poll request failed: {}",
                err
            );
        }
    }
    Ok(())
}

fn harness_error(err: GooseError) -> anyhow::Error {
    anyhow!("load harness error: {err}")
}

/// Build the goose scenario for `kind`.
fn build_scenario(run: Arc<RunContext>, config: &AppConfig) -> Result<Scenario> {
    let startup = {
        let run = run.clone();
        boxed_transaction(move |user| start_user(user, run.clone()).boxed())
    }
    .set_name("startup")
    .set_on_start();
    let poll = {
        let run = run.clone();
        boxed_transaction(move |user| poll_user(user, run.clone()).boxed())
    }
    .set_name("poll");

    let mut scenario = Scenario::new(run.kind.name())
        .register_transaction(startup)
        .register_transaction(poll);
    if let Some((min, max)) = config.load.wait_time()? {
        scenario = scenario.set_wait_time(min, max).map_err(harness_error)?;
    }
    Ok(scenario)
}

/// Run `kind` against the configured target until the run time elapses.
pub async fn run(config: &AppConfig, kind: ScenarioKind, metrics: LoadgenMetrics) -> Result<RunReport> {
    config.validate()?;
    let scenario_name = kind.name();
    let before = RunSummary::capture(&metrics, scenario_name);

    let run = Arc::new(RunContext {
        kind,
        metrics: metrics.clone(),
        halted_idle: config.load.halted_idle,
    });
    let scenario = build_scenario(run, config)?;

    info!(
        scenario = scenario_name,
        host = %config.target.host,
        users = config.load.users,
        hatch_rate = %config.load.hatch_rate,
        run_time_secs = config.load.run_time.as_secs(),
        verify_tls = config.target.verify_tls,
        "starting load run"
    );

    let goose_metrics = GooseAttack::initialize_with_config(GooseConfiguration::default())
        .map_err(harness_error)?
        .register_scenario(scenario)
        .set_default(GooseDefault::Host, config.target.host.as_str())
        .map_err(harness_error)?
        .set_default(GooseDefault::Users, config.load.users)
        .map_err(harness_error)?
        .set_default(GooseDefault::HatchRate, config.load.hatch_rate.as_str())
        .map_err(harness_error)?
        .set_default(GooseDefault::RunTime, config.load.run_time.as_secs() as usize)
        .map_err(harness_error)?
        .set_default(GooseDefault::AcceptInvalidCerts, !config.target.verify_tls)
        .map_err(harness_error)?
        .set_default(GooseDefault::NoTelnet, true)
        .map_err(harness_error)?
        .set_default(GooseDefault::NoWebSocket, true)
        .map_err(harness_error)?
        .execute()
        .await
        .map_err(harness_error)?;

    let summary = RunSummary::capture(&metrics, scenario_name).since(before);
    let harness = HarnessReport::from_goose(&goose_metrics);
    info!(
        scenario = scenario_name,
        registrations_ok = summary.registrations_ok,
        registrations_failed = summary.registrations_failed,
        halted = summary.halted,
        polls_ok = summary.polls_ok,
        polls_failed = summary.polls_failed,
        idle_ticks = summary.idle_ticks,
        request_names = harness.requests.len(),
        distinct_errors = harness.errors.len(),
        "load run finished"
    );
    Ok(RunReport { summary, harness })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use kansas_metrics::new_registry;

    #[test]
    fn kinds_build_matching_users() {
        let options = RegisterPollOptions {
            credentials: Credentials::from_parts(Some("a@b.com".into()), Some("KEY".into())),
            block: true,
        };
        let kind = ScenarioKind::RegisterPoll(options);
        assert_eq!(kind.name(), "register-poll");
        assert_eq!(kind.new_user().scenario(), "register-poll");
        assert!(kind.new_user().queue_id().is_none());

        let kind = ScenarioKind::InternalEvents;
        assert_eq!(kind.name(), "internal-events");
        assert_eq!(kind.new_user().scenario(), "internal-events");
    }

    #[test]
    fn invalid_wait_time_is_rejected_before_launch() {
        let mut config = AppConfig::default();
        config.load.wait_time_min = Some(Duration::from_secs(5));
        config.load.wait_time_max = Some(Duration::from_secs(1));
        let run = Arc::new(RunContext {
            kind: ScenarioKind::InternalEvents,
            metrics: LoadgenMetrics::new(new_registry()).unwrap(),
            halted_idle: Duration::from_secs(1),
        });
        assert!(build_scenario(run, &config).is_err());
    }
}
