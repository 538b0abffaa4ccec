//! ---
//! kansas_section: "03-logging-metrics"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Metrics collection and export utilities."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let bound = std_listener
        .local_addr()
        .with_context(|| "failed to resolve metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %bound, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

/// Prometheus scrape endpoint.
async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("metrics encoding error"),
            )
                .into_response()
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Return the bound address, resolved when port 0 was requested.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Outcome label attached to lifecycle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

/// Lifecycle counters recorded by simulated users.
///
/// Latency and per-request statistics stay with the load harness; these
/// counters only track what the harness cannot see, such as halted users.
#[derive(Clone)]
pub struct LoadgenMetrics {
    registry: SharedRegistry,
    registrations: IntCounterVec,
    halted: IntCounterVec,
    polls: IntCounterVec,
    idle_ticks: IntCounterVec,
}

impl LoadgenMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let registrations = IntCounterVec::new(
            Opts::new(
                "kansas_registrations_total",
                "Startup handshakes by scenario and outcome",
            ),
            &["scenario", "outcome"],
        )?;
        registry.register(Box::new(registrations.clone()))?;

        let halted = IntCounterVec::new(
            Opts::new(
                "kansas_users_halted_total",
                "Simulated users halted after a failed startup handshake",
            ),
            &["scenario"],
        )?;
        registry.register(Box::new(halted.clone()))?;

        let polls = IntCounterVec::new(
            Opts::new(
                "kansas_polls_total",
                "Long-poll requests by scenario and classification",
            ),
            &["scenario", "outcome"],
        )?;
        registry.register(Box::new(polls.clone()))?;

        let idle_ticks = IntCounterVec::new(
            Opts::new(
                "kansas_idle_ticks_total",
                "Poll transactions of halted users that sent no request",
            ),
            &["scenario"],
        )?;
        registry.register(Box::new(idle_ticks.clone()))?;

        Ok(Self {
            registry,
            registrations,
            halted,
            polls,
            idle_ticks,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_registration(&self, scenario: &str, outcome: Outcome) {
        self.registrations
            .with_label_values(&[scenario, outcome.as_str()])
            .inc();
    }

    pub fn record_halt(&self, scenario: &str) {
        self.halted.with_label_values(&[scenario]).inc();
    }

    pub fn record_poll(&self, scenario: &str, outcome: Outcome) {
        self.polls
            .with_label_values(&[scenario, outcome.as_str()])
            .inc();
    }

    pub fn record_idle(&self, scenario: &str) {
        self.idle_ticks.with_label_values(&[scenario]).inc();
    }

    pub fn registrations(&self, scenario: &str, outcome: Outcome) -> u64 {
        self.registrations
            .with_label_values(&[scenario, outcome.as_str()])
            .get()
    }

    pub fn halted(&self, scenario: &str) -> u64 {
        self.halted.with_label_values(&[scenario]).get()
    }

    pub fn polls(&self, scenario: &str, outcome: Outcome) -> u64 {
        self.polls
            .with_label_values(&[scenario, outcome.as_str()])
            .get()
    }

    pub fn idle_ticks(&self, scenario: &str) -> u64 {
        self.idle_ticks.with_label_values(&[scenario]).get()
    }
}

pub use prometheus;
