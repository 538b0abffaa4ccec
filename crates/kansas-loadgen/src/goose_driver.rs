//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "LoadDriver implementation backed by a goose user."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use goose::metrics::GooseRequestMetric;
use goose::prelude::*;

use crate::driver::{LoadDriver, Method, RequestBody, RequestSpec, ResponseCheck, Sample, Verdict};
use crate::error::DriverError;

/// Executes requests through goose so timing and verdicts land in the
/// harness statistics.
pub struct GooseDriver<'a> {
    user: &'a mut GooseUser,
    failure: Option<Box<TransactionError>>,
}

impl<'a> GooseDriver<'a> {
    pub fn new(user: &'a mut GooseUser) -> Self {
        Self {
            user,
            failure: None,
        }
    }

    /// Error of the most recent failed request, for transactions that have
    /// to fail after it.
    pub fn take_failure(&mut self) -> Option<Box<TransactionError>> {
        self.failure.take()
    }

    fn record_success(&mut self, request: &mut GooseRequestMetric) -> Result<(), DriverError> {
        self.failure = None;
        self.user
            .set_success(request)
            .map_err(|err| DriverError::Harness(err.to_string()))
    }

    /// Mark `request` failed under `message`.
    ///
    /// Goose fails non-2xx responses itself, under the status line. Such a
    /// request is flipped back first so the error summary carries `message`.
    fn record_failure(&mut self, message: &str, request: &mut GooseRequestMetric, body: Option<&str>) {
        if !request.success {
            request.error.clear();
            if let Err(err) = self.user.set_success(request) {
                self.failure = Some(err);
                return;
            }
        }
        request.error = message.to_owned();
        self.failure = self.user.set_failure(message, request, None, body).err();
    }
}

fn goose_method(method: Method) -> GooseMethod {
    match method {
        Method::Get => GooseMethod::Get,
        Method::Post => GooseMethod::Post,
    }
}

/// Verdict for a response whose body may not have arrived.
fn settle(status: u16, body: &Result<String, String>, check: &dyn ResponseCheck) -> Verdict {
    match body {
        Ok(body) => check.check(status, body),
        Err(err) => Verdict::Failure(format!("Unreadable response body ({status}): {err}")),
    }
}

#[async_trait]
impl<'a> LoadDriver for GooseDriver<'a> {
    async fn execute(
        &mut self,
        request: RequestSpec,
        check: &dyn ResponseCheck,
    ) -> Result<Sample, DriverError> {
        let method = goose_method(request.method);
        let mut builder = match self.user.get_request_builder(&method, &request.path) {
            Ok(builder) => builder,
            Err(err) => {
                let message = err.to_string();
                self.failure = Some(err);
                return Err(DriverError::Request(message));
            }
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let RequestBody::Form(fields) = &request.body {
            builder = builder.form(fields);
        }

        let goose_request = GooseRequest::builder()
            .method(method)
            .path(request.path.as_str())
            .name(request.stats_name())
            .set_request_builder(builder)
            .build();
        let mut goose = match self.user.request(goose_request).await {
            Ok(goose) => goose,
            Err(err) => {
                let message = err.to_string();
                self.failure = Some(err);
                return Err(DriverError::Harness(message));
            }
        };

        let elapsed = Duration::from_millis(goose.request.response_time);
        let response = match goose.response {
            Ok(response) => response,
            Err(err) => {
                let message = err.to_string();
                self.record_failure(&message, &mut goose.request, None);
                return Err(DriverError::Transport(message));
            }
        };
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| err.to_string());

        let verdict = settle(status, &body, check);
        match &verdict {
            Verdict::Success => self.record_success(&mut goose.request)?,
            Verdict::Failure(message) => {
                self.record_failure(message, &mut goose.request, body.as_deref().ok())
            }
        }
        let body = body.map_err(DriverError::Body)?;

        Ok(Sample {
            status,
            body,
            elapsed,
            verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::HarnessDefault;
    use crate::register_poll::PollCheck;

    #[test]
    fn unreadable_body_fails_even_when_status_passes() {
        let body = Err("connection reset".to_owned());
        assert_eq!(
            settle(200, &body, &HarnessDefault),
            Verdict::Failure("Unreadable response body (200): connection reset".into())
        );
        assert!(matches!(settle(200, &body, &PollCheck), Verdict::Failure(_)));
    }

    #[test]
    fn readable_body_goes_to_the_check() {
        let body = Ok(r#"{"result":"success"}"#.to_owned());
        assert_eq!(settle(200, &body, &PollCheck), Verdict::Success);
        assert_eq!(
            settle(502, &Ok("gateway".into()), &PollCheck),
            Verdict::Failure("Bad status code response: 502 -> gateway".into())
        );
    }
}
