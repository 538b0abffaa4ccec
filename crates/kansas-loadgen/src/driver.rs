//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Boundary between simulated users and the load harness."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
//! The load-driver boundary.
//!
//! Simulated users never talk to the network directly. They describe a
//! request with [`RequestSpec`], hand it to a [`LoadDriver`] together with a
//! [`ResponseCheck`], and receive a [`Sample`]. The driver executes the
//! request, records timing and reports the verdict to the harness statistics.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

/// HTTP methods used by the scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
}

/// Description of one request a simulated user wants executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    /// Path and query, relative to the harness host.
    pub path: String,
    /// Statistics name. Requests sharing a name aggregate together.
    pub name: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            name: None,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: &[(String, String)]) -> Self {
        self.headers.extend(headers.iter().cloned());
        self
    }

    pub fn with_form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    /// Name under which the harness aggregates this request.
    pub fn stats_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Classification of a response for harness reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    /// Failure with the message surfaced in the harness error report.
    Failure(String),
}

impl Verdict {
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }
}

/// Decides whether a response counts as a successful sample.
pub trait ResponseCheck: Send + Sync {
    fn check(&self, status: u16, body: &str) -> Verdict;
}

/// The harness's own rule: any non-error status is a success.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarnessDefault;

impl ResponseCheck for HarnessDefault {
    fn check(&self, status: u16, _body: &str) -> Verdict {
        if status < 400 {
            Verdict::Success
        } else {
            Verdict::Failure(format!("HTTP {status}"))
        }
    }
}

/// Outcome of one executed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub status: u16,
    pub body: String,
    pub elapsed: Duration,
    pub verdict: Verdict,
}

impl Sample {
    pub fn is_success(&self) -> bool {
        self.verdict.is_success()
    }
}

/// Request execution provided by the load harness.
#[async_trait]
pub trait LoadDriver: Send {
    /// Execute `request`, classify the response with `check`, and record the
    /// sample in the harness statistics under [`RequestSpec::stats_name`].
    ///
    /// A failed classification is not an error: it is returned in
    /// [`Sample::verdict`]. Errors mean no classifiable response exists.
    async fn execute(
        &mut self,
        request: RequestSpec,
        check: &dyn ResponseCheck,
    ) -> Result<Sample, DriverError>;
}
