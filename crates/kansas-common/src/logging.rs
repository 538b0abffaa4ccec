//! ---
//! kansas_section: "01-core-functionality"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Tracing setup: console output plus an optional per-run JSON log."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "KANSAS_LOG";
/// Goose logs each failed request at info.
const DEFAULT_DIRECTIVE: &str = "info,goose=warn";

static SINK_GUARDS: OnceCell<Vec<WorkerGuard>> = OnceCell::new();

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Console log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// File the run log of `service_name` goes to, if the configuration asks for one.
///
/// Every run gets its own file, `<prefix>-<unix seconds>.jsonl`, so results
/// of consecutive runs never interleave.
pub fn run_log_path(service_name: &str, config: &LoggingConfig) -> Option<PathBuf> {
    let directory = config.directory.as_ref()?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    let started = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    Some(directory.join(format!("{prefix}-{started}.jsonl")))
}

fn log_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("ignoring invalid {LOG_ENV} directive {directive:?}: {err}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        Err(_) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
        }
    }
}

fn console_layer<S>(format: LogFormat, writer: NonBlocking) -> BoxedLayer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let layer = fmt::layer()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().boxed(),
        LogFormat::Pretty => layer.with_target(true).boxed(),
    }
}

fn run_log_layer<S>(path: &Path) -> Result<(BoxedLayer<S>, WorkerGuard)>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let directory = path
        .parent()
        .context("run log path has no parent directory")?;
    let file_name = path
        .file_name()
        .context("run log path has no file name")?;
    std::fs::create_dir_all(directory)
        .with_context(|| format!("creating log directory {}", directory.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(rolling::never(directory, file_name));
    let layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(writer)
        .boxed();
    Ok((layer, guard))
}

/// Install the global subscriber for `service_name`.
///
/// The filter comes from `KANSAS_LOG`, then `RUST_LOG`, then `info` with goose
/// muted to warnings. Records always go to stdout in the configured format.
/// When `logging.directory` is set they are also written as JSON lines to
/// the file named by [`run_log_path`]. Returns that path.
///
/// A second call leaves the first subscriber in place.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<Option<PathBuf>> {
    let mut guards = Vec::with_capacity(2);
    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);

    let log_path = run_log_path(service_name, config);
    let file_layer = match &log_path {
        Some(path) => {
            let (layer, guard) = run_log_layer(path)?;
            guards.push(guard);
            Some(layer)
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(log_filter())
        .with(console_layer(config.format, stdout))
        .with(file_layer)
        .try_init()
        .is_ok();
    if installed {
        let _ = SINK_GUARDS.set(guards);
        info!(
            service = %service_name,
            format = ?config.format,
            run_log = ?log_path,
            "tracing initialised"
        );
    }
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_log_is_opt_in() {
        let config = LoggingConfig::default();
        assert!(config.directory.is_none());
        assert_eq!(run_log_path("kansas-load", &config), None);
    }

    #[test]
    fn run_log_path_uses_prefix_or_service() {
        let mut config = LoggingConfig {
            directory: Some(PathBuf::from("/var/log/kansas")),
            ..LoggingConfig::default()
        };
        let path = run_log_path("kansas-load", &config).unwrap();
        assert_eq!(path.parent(), Some(Path::new("/var/log/kansas")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("kansas-load-"), "{name}");
        assert!(name.ends_with(".jsonl"), "{name}");

        config.file_prefix = Some("nightly".into());
        let name = run_log_path("kansas-load", &config)
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("nightly-"), "{name}");
    }

    #[test]
    fn configured_directory_is_created() -> Result<()> {
        let dir = tempdir()?;
        let config = LoggingConfig {
            directory: Some(dir.path().join("runs")),
            format: LogFormat::StructuredJson,
            file_prefix: Some("test".into()),
        };
        let path = init_tracing("kansas-test", &config)?.expect("run log path");
        assert!(dir.path().join("runs").is_dir());
        assert!(path.starts_with(dir.path().join("runs")));
        // Already installed: the second call still succeeds.
        assert!(init_tracing("kansas-test", &LoggingConfig::default())?.is_none());
        Ok(())
    }
}
