//! ---
//! kansas_section: "02-load-scenarios"
//! kansas_subsection: "module"
//! kansas_type: "source"
//! kansas_scope: "code"
//! kansas_description: "Error types raised by simulated users and drivers."
//! kansas_version: "v0.1.0"
//! kansas_owner: "tbd"
//! ---
use thiserror::Error;

use crate::lifecycle::UserPhase;

/// Failures raised while the harness executes a request on behalf of a user.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The request could not be assembled (bad path, bad header).
    #[error("request could not be built: {0}")]
    Request(String),
    /// No HTTP response was obtained.
    #[error("transport failure: {0}")]
    Transport(String),
    /// A response arrived but its body could not be read.
    #[error("response body unreadable: {0}")]
    Body(String),
    /// The harness refused the operation.
    #[error("harness error: {0}")]
    Harness(String),
}

/// Reasons a startup handshake leaves the user halted.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("registration returned status {status}")]
    BadStatus { status: u16 },
    #[error("registration response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("registration unsuccessful (result: {})", .0.as_deref().unwrap_or("<missing>"))]
    Unsuccessful(Option<String>),
    #[error("registration response carried no queue id")]
    MissingQueueId,
    #[error("startup requested while user is {0}")]
    InvalidPhase(UserPhase),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Failures of a single polling task invocation.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("user has no queue id")]
    NotRegistered,
    #[error(transparent)]
    Driver(#[from] DriverError),
}
