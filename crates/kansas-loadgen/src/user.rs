//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Behaviour contract implemented by every simulated user."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use async_trait::async_trait;

use crate::driver::{LoadDriver, Sample};
use crate::error::{StartupError, TaskError};

/// One simulated client session.
///
/// The harness calls [`SimulatedUser::on_start`] exactly once, then
/// [`SimulatedUser::on_task`] repeatedly. Callers go through
/// [`crate::lifecycle::Lifecycle`], which refuses to poll a user whose
/// startup did not yield a queue id.
#[async_trait]
pub trait SimulatedUser: Send + Sync {
    /// Scenario label used in logs and metrics.
    fn scenario(&self) -> &'static str;

    /// Startup handshake. Establishes the queue id.
    async fn on_start(&mut self, driver: &mut dyn LoadDriver) -> Result<(), StartupError>;

    /// Issue one long-poll request.
    async fn on_task(&self, driver: &mut dyn LoadDriver) -> Result<Sample, TaskError>;

    /// Queue id captured during startup.
    fn queue_id(&self) -> Option<&str>;
}
