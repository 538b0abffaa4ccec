//! ---
//! kansas_section: "01-core-functionality"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Shared primitives and utilities for the load tooling."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
//! Shared primitives for the Kansas load generation workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed by the load generator and its binaries.

pub mod config;
pub mod logging;

pub use config::{AppConfig, LoadConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, TargetConfig};
pub use logging::{init_tracing, LogFormat};
