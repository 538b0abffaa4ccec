//! ---
//! kansas_section: "03-logging-metrics"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Structured logging adapters for simulated users."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

#[macro_use]
pub mod macros;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Scenario the simulated user belongs to.
    pub scenario: Option<&'a str>,
    /// Harness-assigned index of the simulated user.
    pub user: Option<usize>,
    /// Queue identifier once known.
    pub queue_id: Option<&'a str>,
    /// Lifecycle phase of the user.
    pub phase: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a scenario name.
    pub fn with_scenario(mut self, scenario: &'a str) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Attach a user index.
    pub fn with_user(mut self, user: usize) -> Self {
        self.user = Some(user);
        self
    }

    /// Attach a queue identifier.
    pub fn with_queue_id(mut self, queue_id: &'a str) -> Self {
        self.queue_id = Some(queue_id);
        self
    }

    /// Attach a lifecycle phase descriptor.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// Outcome used when emitting user lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEventOutcome {
    /// The transition completed as expected.
    Success,
    /// The transition failed and the user was halted.
    Fault,
}

impl UserEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            UserEventOutcome::Success => "success",
            UserEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized user lifecycle event.
pub fn log_user_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: UserEventOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    // `tracing::event!` needs a constant level.
    match outcome {
        UserEventOutcome::Fault => tracing::event!(
            Level::WARN,
            event,
            outcome = outcome.as_str(),
            scenario = ctx.scenario.unwrap_or(""),
            user = ctx.user.unwrap_or_default(),
            queue_id = ctx.queue_id.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %message
        ),
        UserEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            scenario = ctx.scenario.unwrap_or(""),
            user = ctx.user.unwrap_or_default(),
            queue_id = ctx.queue_id.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %message
        ),
    }
}
