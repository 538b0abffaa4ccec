//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Register-then-poll scenario against the event queue API."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
//! Each user registers a queue with `POST /api/v1/register`, then long-polls
//! `/json/events` for that queue with the same credentials.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::{auth_headers, Credentials};
use crate::driver::{LoadDriver, RequestSpec, ResponseCheck, Sample, Verdict};
use crate::error::{StartupError, TaskError};
use crate::user::SimulatedUser;

pub const SCENARIO: &str = "register-poll";
pub const REGISTER_PATH: &str = "/api/v1/register";
/// Stands in for the queue id in the statistics name of poll requests.
pub const QUEUE_PLACEHOLDER: &str = "...";
const SUCCESS_MARKER: &str = "success";

/// Launch options of the register-poll scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterPollOptions {
    pub credentials: Option<Credentials>,
    /// Ask the server to hold polls open (`dont_block=false`).
    pub block: bool,
}

/// Poll URL with the queue id replaced by [`QUEUE_PLACEHOLDER`].
pub fn poll_name_template(block: bool) -> String {
    format!(
        "/json/events?queue_id={QUEUE_PLACEHOLDER}&last_event_id=-1&dont_block={}",
        !block
    )
}

/// Substitute `queue_id` for the first placeholder of `template`.
pub fn poll_url(template: &str, queue_id: &str) -> String {
    template.replacen(QUEUE_PLACEHOLDER, queue_id, 1)
}

#[derive(Debug, Deserialize)]
struct RegistrationBody {
    result: Option<String>,
    queue_id: Option<Value>,
}

/// Extract the queue id from a registration response.
pub fn evaluate_registration(status: u16, body: &str) -> Result<String, StartupError> {
    if status != 200 {
        return Err(StartupError::BadStatus { status });
    }
    let parsed: RegistrationBody =
        serde_json::from_str(body).map_err(|err| StartupError::InvalidJson(err.to_string()))?;
    if parsed.result.as_deref() != Some(SUCCESS_MARKER) {
        return Err(StartupError::Unsuccessful(parsed.result));
    }
    match parsed.queue_id {
        Some(Value::String(id)) if !id.is_empty() => Ok(id),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(StartupError::MissingQueueId),
    }
}

/// Classifies the registration sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationCheck;

impl ResponseCheck for RegistrationCheck {
    fn check(&self, status: u16, body: &str) -> Verdict {
        match evaluate_registration(status, body) {
            Ok(_) => Verdict::Success,
            Err(StartupError::BadStatus { status }) => Verdict::Failure(format!(
                "Bad registration status code response: {status} -> {body}"
            )),
            Err(StartupError::InvalidJson(_)) => {
                Verdict::Failure(format!("Invalid JSON response to registration: {body}"))
            }
            Err(StartupError::Unsuccessful(_)) => {
                Verdict::Failure(format!("Unsuccessful registration: {body}"))
            }
            Err(other) => Verdict::Failure(format!("{other}: {body}")),
        }
    }
}

/// Classifies a poll sample: status 200 with the success marker in the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollCheck;

impl ResponseCheck for PollCheck {
    fn check(&self, status: u16, body: &str) -> Verdict {
        if status != 200 {
            Verdict::Failure(format!("Bad status code response: {status} -> {body}"))
        } else if !body.contains(SUCCESS_MARKER) {
            Verdict::Failure(format!("Bad response: {body}"))
        } else {
            Verdict::Success
        }
    }
}

/// Simulated user of the register-poll scenario.
#[derive(Debug, Clone)]
pub struct RegisterPollUser {
    headers: Vec<(String, String)>,
    poll_name: String,
    queue_id: Option<String>,
    poll_url: Option<String>,
}

impl RegisterPollUser {
    pub fn new(options: &RegisterPollOptions) -> Self {
        Self {
            headers: auth_headers(options.credentials.as_ref()),
            poll_name: poll_name_template(options.block),
            queue_id: None,
            poll_url: None,
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn poll_name(&self) -> &str {
        &self.poll_name
    }

    pub fn poll_url(&self) -> Option<&str> {
        self.poll_url.as_deref()
    }
}

#[async_trait]
impl SimulatedUser for RegisterPollUser {
    fn scenario(&self) -> &'static str {
        SCENARIO
    }

    async fn on_start(&mut self, driver: &mut dyn LoadDriver) -> Result<(), StartupError> {
        let request = RequestSpec::post(REGISTER_PATH).with_headers(&self.headers);
        let sample = driver.execute(request, &RegistrationCheck).await?;
        let queue_id = evaluate_registration(sample.status, &sample.body)?;

        self.poll_url = Some(poll_url(&self.poll_name, &queue_id));
        self.queue_id = Some(queue_id);
        Ok(())
    }

    async fn on_task(&self, driver: &mut dyn LoadDriver) -> Result<Sample, TaskError> {
        let url = self.poll_url.as_deref().ok_or(TaskError::NotRegistered)?;
        let request = RequestSpec::get(url)
            .with_name(self.poll_name.as_str())
            .with_headers(&self.headers);
        Ok(driver.execute(request, &PollCheck).await?)
    }

    fn queue_id(&self) -> Option<&str> {
        self.queue_id.as_deref()
    }
}
