//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Simulated users for long-poll event queue load tests."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
//! Simulated users that load a long-polling event queue server.
//!
//! Two scenarios are provided: [`register_poll`] registers a queue through
//! the public API and polls it, [`internal_events`] announces a locally
//! generated queue on the internal endpoint and polls it. Both run on top
//! of the [`driver::LoadDriver`] boundary; [`scenario::run`] drives them
//! through goose and returns a [`report::RunReport`].

pub mod auth;
pub mod driver;
pub mod error;
pub mod goose_driver;
pub mod internal_events;
pub mod lifecycle;
pub mod register_poll;
pub mod report;
pub mod scenario;
pub mod user;

pub use auth::Credentials;
pub use driver::{HarnessDefault, LoadDriver, RequestSpec, ResponseCheck, Sample, Verdict};
pub use error::{DriverError, StartupError, TaskError};
pub use lifecycle::{Lifecycle, TickOutcome, UserPhase};
pub use register_poll::RegisterPollOptions;
pub use report::{ErrorStat, HarnessReport, RequestStat, RunReport, RunSummary, TransactionStat};
pub use scenario::{run, ScenarioKind};
pub use user::SimulatedUser;
