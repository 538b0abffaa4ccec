//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Per-user state machine gating polling on a successful handshake."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
//! `created -> registering -> polling | halted`.
//!
//! A halted user never issues another request. There is no way back from
//! `Halted` or `Polling` to `Registering`.

use std::fmt;

use crate::driver::{LoadDriver, Sample};
use crate::error::{StartupError, TaskError};
use crate::user::SimulatedUser;

/// Lifecycle phase of a simulated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserPhase {
    Created,
    Registering,
    Polling,
    Halted,
}

impl UserPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserPhase::Created => "created",
            UserPhase::Registering => "registering",
            UserPhase::Polling => "polling",
            UserPhase::Halted => "halted",
        }
    }
}

impl fmt::Display for UserPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one harness task invocation.
#[derive(Debug)]
pub enum TickOutcome {
    /// The user is not polling; no request was issued.
    Skipped,
    Polled(Sample),
    Failed(TaskError),
}

/// A simulated user together with its lifecycle phase.
pub struct Lifecycle {
    phase: UserPhase,
    halt_reason: Option<String>,
    user: Box<dyn SimulatedUser>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("scenario", &self.user.scenario())
            .field("phase", &self.phase)
            .field("queue_id", &self.user.queue_id())
            .field("halt_reason", &self.halt_reason)
            .finish()
    }
}

impl Lifecycle {
    pub fn new(user: Box<dyn SimulatedUser>) -> Self {
        Self {
            phase: UserPhase::Created,
            halt_reason: None,
            user,
        }
    }

    pub fn phase(&self) -> UserPhase {
        self.phase
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    pub fn user(&self) -> &dyn SimulatedUser {
        self.user.as_ref()
    }

    pub fn scenario(&self) -> &'static str {
        self.user.scenario()
    }

    pub fn queue_id(&self) -> Option<&str> {
        self.user.queue_id()
    }

    /// Run the startup handshake.
    ///
    /// Moves to `Polling` only when the handshake succeeded and left a
    /// non-empty queue id behind. Every other outcome halts the user.
    pub async fn start(&mut self, driver: &mut dyn LoadDriver) -> Result<(), StartupError> {
        if self.phase != UserPhase::Created {
            return Err(StartupError::InvalidPhase(self.phase));
        }
        self.phase = UserPhase::Registering;

        let result = match self.user.on_start(driver).await {
            Ok(()) if self.user.queue_id().is_some_and(|id| !id.is_empty()) => Ok(()),
            Ok(()) => Err(StartupError::MissingQueueId),
            Err(err) => Err(err),
        };

        match &result {
            Ok(()) => self.phase = UserPhase::Polling,
            Err(err) => {
                self.phase = UserPhase::Halted;
                self.halt_reason = Some(err.to_string());
            }
        }
        result
    }

    /// Run one polling task, or nothing unless the user is polling.
    pub async fn tick(&self, driver: &mut dyn LoadDriver) -> TickOutcome {
        if self.phase != UserPhase::Polling {
            return TickOutcome::Skipped;
        }
        match self.user.on_task(driver).await {
            Ok(sample) => TickOutcome::Polled(sample),
            Err(err) => TickOutcome::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::driver::testing::ScriptedDriver;
    use crate::driver::{HarnessDefault, RequestSpec};

    /// Stub user whose handshake stores whatever queue id it is given.
    struct StubUser {
        assign: Option<String>,
        queue_id: Option<String>,
    }

    impl StubUser {
        fn boxed(assign: Option<&str>) -> Box<dyn SimulatedUser> {
            Box::new(Self {
                assign: assign.map(str::to_owned),
                queue_id: None,
            })
        }
    }

    #[async_trait]
    impl SimulatedUser for StubUser {
        fn scenario(&self) -> &'static str {
            "stub"
        }

        async fn on_start(&mut self, driver: &mut dyn LoadDriver) -> Result<(), StartupError> {
            driver
                .execute(RequestSpec::post("/start"), &HarnessDefault)
                .await?;
            self.queue_id = self.assign.clone();
            Ok(())
        }

        async fn on_task(&self, driver: &mut dyn LoadDriver) -> Result<Sample, TaskError> {
            Ok(driver
                .execute(RequestSpec::get("/poll"), &HarnessDefault)
                .await?)
        }

        fn queue_id(&self) -> Option<&str> {
            self.queue_id.as_deref()
        }
    }

    #[tokio::test]
    async fn successful_start_enables_polling() {
        let mut driver = ScriptedDriver::new().respond(200, "").respond(200, "ok");
        let mut lifecycle = Lifecycle::new(StubUser::boxed(Some("q1")));
        assert_eq!(lifecycle.phase(), UserPhase::Created);

        lifecycle.start(&mut driver).await.unwrap();
        assert_eq!(lifecycle.phase(), UserPhase::Polling);
        assert_eq!(lifecycle.queue_id(), Some("q1"));

        assert!(matches!(
            lifecycle.tick(&mut driver).await,
            TickOutcome::Polled(_)
        ));
        assert_eq!(driver.paths(), vec!["/start", "/poll"]);
    }

    #[tokio::test]
    async fn empty_queue_id_halts_without_polling() {
        let mut driver = ScriptedDriver::new().respond(200, "");
        let mut lifecycle = Lifecycle::new(StubUser::boxed(Some("")));

        let err = lifecycle.start(&mut driver).await.unwrap_err();
        assert!(matches!(err, StartupError::MissingQueueId));
        assert_eq!(lifecycle.phase(), UserPhase::Halted);
        assert!(lifecycle.halt_reason().is_some());

        for _ in 0..3 {
            assert!(matches!(
                lifecycle.tick(&mut driver).await,
                TickOutcome::Skipped
            ));
        }
        assert_eq!(driver.paths(), vec!["/start"]);
    }

    #[tokio::test]
    async fn transport_failure_halts() {
        let mut driver = ScriptedDriver::new().fail_transport("connection refused");
        let mut lifecycle = Lifecycle::new(StubUser::boxed(Some("q1")));

        let err = lifecycle.start(&mut driver).await.unwrap_err();
        assert!(matches!(err, StartupError::Driver(_)));
        assert_eq!(lifecycle.phase(), UserPhase::Halted);
        assert!(lifecycle
            .halt_reason()
            .is_some_and(|reason| reason.contains("connection refused")));
    }

    #[tokio::test]
    async fn start_runs_once() {
        let mut driver = ScriptedDriver::new().respond(200, "");
        let mut lifecycle = Lifecycle::new(StubUser::boxed(Some("q1")));
        lifecycle.start(&mut driver).await.unwrap();

        let err = lifecycle.start(&mut driver).await.unwrap_err();
        assert!(matches!(
            err,
            StartupError::InvalidPhase(UserPhase::Polling)
        ));
        assert_eq!(lifecycle.phase(), UserPhase::Polling);
        assert_eq!(driver.paths(), vec!["/start"]);
    }

    #[tokio::test]
    async fn unstarted_user_never_polls() {
        let mut driver = ScriptedDriver::new();
        let lifecycle = Lifecycle::new(StubUser::boxed(Some("q1")));
        assert!(matches!(
            lifecycle.tick(&mut driver).await,
            TickOutcome::Skipped
        ));
        assert!(driver.recorded.is_empty());
    }
}
