//! ---
//! kansas_section: "05-cli"
//! kansas_subsection: "binary"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Binary entrypoint launching a load scenario through goose."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use kansas_common::config::AppConfig;
use kansas_common::logging::init_tracing;
use kansas_loadgen::{run, Credentials, RegisterPollOptions, ScenarioKind};
use kansas_metrics::{new_registry, spawn_http_server, LoadgenMetrics};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load generator for long-polling event queue servers",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: LoadOverrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Default, Args)]
struct LoadOverrides {
    #[arg(long, global = true, help = "Target base URL, e.g. https://chat.example.com")]
    host: Option<String>,

    #[arg(long, global = true, help = "Number of simulated users")]
    users: Option<usize>,

    #[arg(long, global = true, help = "Users launched per second")]
    hatch_rate: Option<String>,

    #[arg(long, global = true, value_name = "SECONDS", help = "Run time once all users are launched")]
    run_time: Option<u64>,
}

impl LoadOverrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.target.host = host.clone();
        }
        if let Some(users) = self.users {
            config.load.users = users;
        }
        if let Some(rate) = &self.hatch_rate {
            config.load.hatch_rate = rate.clone();
        }
        if let Some(secs) = self.run_time {
            config.load.run_time = Duration::from_secs(secs);
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Register a queue per user, then long-poll it")]
    RegisterPoll {
        #[arg(long, env = "KANSAS_EMAIL", help = "Account email for Basic authentication")]
        email: Option<String>,
        #[arg(long, env = "KANSAS_API_KEY", hide_env_values = true, help = "API key for Basic authentication")]
        api_key: Option<String>,
        #[arg(long, help = "Request blocking polls (dont_block=false)")]
        block: bool,
    },
    #[command(about = "Announce a generated queue on the internal endpoint, then poll it")]
    InternalEvents,
}

impl Commands {
    fn into_kind(self) -> ScenarioKind {
        match self {
            Commands::RegisterPoll {
                email,
                api_key,
                block,
            } => ScenarioKind::RegisterPoll(RegisterPollOptions {
                credentials: Credentials::from_parts(email, api_key),
                block,
            }),
            Commands::InternalEvents => ScenarioKind::InternalEvents,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("kansas.toml"));
    candidates.push(PathBuf::from("configs/kansas.toml"));

    let loaded = AppConfig::load_or_default(&candidates)?;
    let mut config = loaded.config;
    cli.overrides.apply(&mut config);
    config.validate()?;
    init_tracing("kansas-load", &config.logging)?;

    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }
    let kind = cli.command.into_kind();
    if let ScenarioKind::RegisterPoll(options) = &kind {
        if options.credentials.is_none() {
            warn!("no credentials supplied; registrations are sent unauthenticated");
        }
    }

    let registry = new_registry();
    let metrics = LoadgenMetrics::new(registry.clone())?;
    let metrics_server = if config.metrics.enabled {
        Some(spawn_http_server(registry, config.metrics.listen)?)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let report = run(&config, kind, metrics).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_poll_flags_build_credentials() {
        let cli = Cli::try_parse_from([
            "kansas-load",
            "register-poll",
            "--email",
            "a@b.com",
            "--api-key",
            "KEY",
            "--block",
        ])
        .unwrap();
        match cli.command.into_kind() {
            ScenarioKind::RegisterPoll(options) => {
                assert!(options.block);
                assert_eq!(
                    options.credentials.map(|c| c.authorization()),
                    Some("Basic YUBiLmNvbTpLRVk=".to_owned())
                );
            }
            other => panic!("unexpected scenario {other:?}"),
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let cli = Cli::try_parse_from([
            "kansas-load",
            "internal-events",
            "--host",
            "https://tornado.test",
            "--users",
            "40",
            "--hatch-rate",
            "0.5",
            "--run-time",
            "30",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        cli.overrides.apply(&mut config);
        assert_eq!(config.target.host, "https://tornado.test");
        assert_eq!(config.load.users, 40);
        assert_eq!(config.load.hatch_rate, "0.5");
        assert_eq!(config.load.run_time, Duration::from_secs(30));
        assert!(config.validate().is_ok());
        assert!(matches!(cli.command, Commands::InternalEvents));
    }
}
