//! Read-only connectivity probes against external APIs.

use thiserror::Error;

pub mod health;
pub mod models;

pub use health::{check_health, configured_flag, setup_instructions, HealthCheck};
pub use models::{probe_models, Attempt, ModelCandidate, ProbeOutcome};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

pub type ProbeResult<T> = Result<T, ProbeError>;
