//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Internal-events scenario with client-generated queue ids."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
//! Each user picks its own queue id, announces it on the internal events
//! endpoint of shard 9800 and polls it without blocking.

use async_trait::async_trait;
use kansas_logging::{kl_debug, LogContext};
use rand::Rng;

use crate::driver::{HarnessDefault, LoadDriver, RequestSpec, Sample};
use crate::error::{StartupError, TaskError};
use crate::user::SimulatedUser;

pub const SCENARIO: &str = "internal-events";
pub const INTERNAL_EVENTS_PATH: &str = "/api/v1/events/internal";
pub const SHARD_HEADER: &str = "x-tornado-shard";
pub const SHARD: &str = "9800";
pub const POLL_NAME: &str = "/json/events?queue_id=...&dont_block=true";

/// 32 lowercase hex characters.
pub fn generate_queue_id<R: Rng>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

pub fn poll_path(queue_id: &str) -> String {
    format!("/json/events?queue_id={queue_id}&dont_block=true")
}

/// Simulated user of the internal-events scenario.
#[derive(Debug, Clone, Default)]
pub struct InternalEventsUser {
    queue_id: Option<String>,
}

impl InternalEventsUser {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SimulatedUser for InternalEventsUser {
    fn scenario(&self) -> &'static str {
        SCENARIO
    }

    async fn on_start(&mut self, driver: &mut dyn LoadDriver) -> Result<(), StartupError> {
        let queue_id = generate_queue_id(&mut rand::thread_rng());
        let request = RequestSpec::post(INTERNAL_EVENTS_PATH)
            .with_header(SHARD_HEADER, SHARD)
            .with_form([("queue_id", queue_id.as_str())]);
        self.queue_id = Some(queue_id);

        // The announcement is fire-and-forget.
        if let Err(err) = driver.execute(request, &HarnessDefault).await {
            let ctx = LogContext::new()
                .with_scenario(SCENARIO)
                .with_queue_id(self.queue_id.as_deref().unwrap_or_default());
            kl_debug!(context = ctx, "internal event post failed: {}", err);
        }
        Ok(())
    }

    async fn on_task(&self, driver: &mut dyn LoadDriver) -> Result<Sample, TaskError> {
        let queue_id = self.queue_id.as_deref().ok_or(TaskError::NotRegistered)?;
        let request = RequestSpec::get(poll_path(queue_id)).with_name(POLL_NAME);
        Ok(driver.execute(request, &HarnessDefault).await?)
    }

    fn queue_id(&self) -> Option<&str> {
        self.queue_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::ScriptedDriver;
    use crate::driver::RequestBody;
    use crate::lifecycle::{Lifecycle, TickOutcome, UserPhase};

    fn is_queue_id(id: &str) -> bool {
        id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }

    #[test]
    fn generated_ids_are_32_hex_chars() {
        let mut rng = rand::thread_rng();
        let first = generate_queue_id(&mut rng);
        let second = generate_queue_id(&mut rng);
        assert!(is_queue_id(&first));
        assert!(is_queue_id(&second));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn startup_posts_internal_event_then_polls_without_auth() {
        let mut driver = ScriptedDriver::new()
            .respond(200, "")
            .respond(200, r#"{"result":"success"}"#);
        let mut lifecycle = Lifecycle::new(Box::new(InternalEventsUser::new()));

        lifecycle.start(&mut driver).await.unwrap();
        let queue_id = lifecycle.queue_id().unwrap().to_owned();
        assert!(is_queue_id(&queue_id));

        assert!(matches!(
            lifecycle.tick(&mut driver).await,
            TickOutcome::Polled(_)
        ));

        let post = &driver.recorded[0].request;
        assert_eq!(post.path, INTERNAL_EVENTS_PATH);
        assert_eq!(post.header("x-tornado-shard"), Some("9800"));
        assert_eq!(
            post.body,
            RequestBody::Form(vec![("queue_id".into(), queue_id.clone())])
        );

        let poll = &driver.recorded[1].request;
        assert_eq!(
            poll.path,
            format!("/json/events?queue_id={queue_id}&dont_block=true")
        );
        assert_eq!(poll.stats_name(), POLL_NAME);
        assert!(poll.headers.is_empty());
    }

    #[tokio::test]
    async fn announcement_failures_are_ignored() {
        let mut driver = ScriptedDriver::new()
            .fail_transport("reset by peer")
            .respond(404, "")
            .respond(200, "anything");
        let mut lifecycle = Lifecycle::new(Box::new(InternalEventsUser::new()));

        lifecycle.start(&mut driver).await.unwrap();
        assert_eq!(lifecycle.phase(), UserPhase::Polling);

        assert!(matches!(
            lifecycle.tick(&mut driver).await,
            TickOutcome::Polled(ref sample) if !sample.is_success()
        ));
        assert!(matches!(
            lifecycle.tick(&mut driver).await,
            TickOutcome::Polled(ref sample) if sample.is_success()
        ));
    }
}
