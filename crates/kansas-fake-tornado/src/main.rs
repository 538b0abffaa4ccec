//! ---
//! kansas_section: "04-test-servers"
//! kansas_subsection: "binary"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Binary entrypoint for the fake Tornado server."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use kansas_common::{init_tracing, LogFormat, LoggingConfig};
use kansas_fake_tornado::{FakeTornadoBuilder, RegistrationMode};
use tokio::signal;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "Pretend Tornado server, for testing", long_about = None)]
struct Cli {
    #[arg(short = 'p', long, value_name = "PORT", help = "Listen port")]
    port: u16,

    #[arg(
        short = 't',
        long,
        value_name = "SECONDS",
        default_value_t = 50,
        help = "Seconds to hold blocking polls"
    )]
    time: u64,

    #[arg(long, value_enum, default_value_t = CliRegistration::Success, help = "How registrations are answered")]
    registration: CliRegistration,

    #[arg(long, default_value_t = 500, help = "Status used by --registration reject")]
    reject_status: u16,

    #[arg(long, value_name = "HEADER", help = "Required Authorization header for registrations")]
    require_authorization: Option<String>,

    #[arg(long, help = "Log JSON lines instead of pretty output")]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliRegistration {
    Success,
    Reject,
    Unsuccessful,
    Malformed,
}

impl Cli {
    fn registration_mode(&self) -> RegistrationMode {
        match self.registration {
            CliRegistration::Success => RegistrationMode::Success,
            CliRegistration::Reject => RegistrationMode::Reject(self.reject_status),
            CliRegistration::Unsuccessful => RegistrationMode::Unsuccessful,
            CliRegistration::Malformed => RegistrationMode::Malformed,
        }
    }

    /// Console-only logging; the fake server keeps no log files.
    fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            directory: None,
            format: if self.json_logs {
                LogFormat::StructuredJson
            } else {
                LogFormat::Pretty
            },
            file_prefix: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("kansas-fake-tornado", &cli.logging())?;

    let listen = SocketAddr::from((Ipv4Addr::LOCALHOST, cli.port));
    let mut builder = FakeTornadoBuilder::new(listen)
        .with_sleep(Duration::from_secs(cli.time))
        .with_registration_mode(cli.registration_mode());
    if let Some(header) = cli.require_authorization.clone() {
        builder = builder.require_authorization(header);
    }
    let server = builder.spawn().await?;

    signal::ctrl_c().await?;
    info!("shutdown signal received");
    let stats = server.stats();
    info!(
        registrations = stats.registrations,
        internal_events = stats.internal_events,
        polls = stats.total_polls(),
        "fake tornado stopping"
    );
    server.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_stays_on_the_console() {
        let cli = Cli::try_parse_from(["kansas-fake-tornado", "--port", "9800"]).unwrap();
        let logging = cli.logging();
        assert_eq!(logging.directory, None);
        assert_eq!(logging.format, LogFormat::Pretty);

        let cli =
            Cli::try_parse_from(["kansas-fake-tornado", "-p", "9800", "--json-logs"]).unwrap();
        assert_eq!(cli.logging().format, LogFormat::StructuredJson);
        assert_eq!(cli.logging().directory, None);
    }
}
