//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Run results: lifecycle counters and the harness request/error tables."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use goose::goose::GooseMethod;
use goose::metrics::GooseMetrics;
use kansas_metrics::{LoadgenMetrics, Outcome};
use serde::Serialize;

/// Lifecycle counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub registrations_ok: u64,
    pub registrations_failed: u64,
    pub halted: u64,
    pub polls_ok: u64,
    pub polls_failed: u64,
    /// Poll transactions of halted users. The harness counts them as
    /// transactions although no request went out.
    pub idle_ticks: u64,
}

impl RunSummary {
    pub(crate) fn capture(metrics: &LoadgenMetrics, scenario: &str) -> Self {
        Self {
            registrations_ok: metrics.registrations(scenario, Outcome::Success),
            registrations_failed: metrics.registrations(scenario, Outcome::Failure),
            halted: metrics.halted(scenario),
            polls_ok: metrics.polls(scenario, Outcome::Success),
            polls_failed: metrics.polls(scenario, Outcome::Failure),
            idle_ticks: metrics.idle_ticks(scenario),
        }
    }

    pub(crate) fn since(self, earlier: RunSummary) -> Self {
        Self {
            registrations_ok: self.registrations_ok - earlier.registrations_ok,
            registrations_failed: self.registrations_failed - earlier.registrations_failed,
            halted: self.halted - earlier.halted,
            polls_ok: self.polls_ok - earlier.polls_ok,
            polls_failed: self.polls_failed - earlier.polls_failed,
            idle_ticks: self.idle_ticks - earlier.idle_ticks,
        }
    }
}

fn method_name(method: &GooseMethod) -> String {
    format!("{method:?}").to_uppercase()
}

/// Requests aggregated under one statistics name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestStat {
    pub method: String,
    pub name: String,
    pub success_count: usize,
    pub fail_count: usize,
}

/// One distinct failure message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorStat {
    pub method: String,
    pub name: String,
    pub error: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionStat {
    pub scenario: String,
    pub name: String,
    pub success_count: usize,
    pub fail_count: usize,
}

/// What the load harness recorded, sorted for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarnessReport {
    pub requests: Vec<RequestStat>,
    pub errors: Vec<ErrorStat>,
    pub transactions: Vec<TransactionStat>,
}

impl HarnessReport {
    pub fn from_goose(metrics: &GooseMetrics) -> Self {
        let mut requests: Vec<RequestStat> = metrics
            .requests
            .values()
            .map(|aggregate| RequestStat {
                method: method_name(&aggregate.method),
                name: aggregate.path.clone(),
                success_count: aggregate.success_count,
                fail_count: aggregate.fail_count,
            })
            .collect();
        requests.sort_by(|a, b| (&a.method, &a.name).cmp(&(&b.method, &b.name)));

        let mut errors: Vec<ErrorStat> = metrics
            .errors
            .values()
            .map(|aggregate| ErrorStat {
                method: method_name(&aggregate.method),
                name: aggregate.name.clone(),
                error: aggregate.error.clone(),
                occurrences: aggregate.occurrences,
            })
            .collect();
        errors.sort_by(|a, b| b.occurrences.cmp(&a.occurrences).then_with(|| a.error.cmp(&b.error)));

        let transactions = metrics
            .transactions
            .iter()
            .flatten()
            .map(|aggregate| TransactionStat {
                scenario: aggregate.scenario_name.clone(),
                name: aggregate.transaction_name.clone(),
                success_count: aggregate.success_count,
                fail_count: aggregate.fail_count,
            })
            .collect();

        Self {
            requests,
            errors,
            transactions,
        }
    }

    /// Entries recorded for `method`, e.g. `GET`.
    pub fn requests_for<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a RequestStat> {
        self.requests
            .iter()
            .filter(move |stat| stat.method.eq_ignore_ascii_case(method))
    }

    /// First error whose message contains `needle`.
    pub fn error_containing(&self, needle: &str) -> Option<&ErrorStat> {
        self.errors.iter().find(|stat| stat.error.contains(needle))
    }

    pub fn transaction(&self, name: &str) -> Option<&TransactionStat> {
        self.transactions.iter().find(|stat| stat.name == name)
    }
}

/// Result of [`crate::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub harness: HarnessReport,
}
