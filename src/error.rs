//! Client error taxonomy
//!
//! Every failure the client surfaces is one of these kinds. Only two cases
//! are absorbed locally: a 404 on a status lookup (empty status document)
//! and a 404 on delete (already gone).

use std::io;

use cpf_protocol::ProtocolError;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum CpfError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Job results have not yet been created: {job_url}")]
    NotReady { job_url: String },

    #[error("Only a file path or http, https, file URLs are supported: {0}")]
    UnsupportedInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure kind for exit code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP/transport failures (exit code 20)
    Transport = 20,
    /// Server answered outside the protocol (exit code 30)
    Protocol = 30,
    /// Results requested before completion (exit code 40)
    NotReady = 40,
    /// Input source could not be resolved (exit code 50)
    UnsupportedInput = 50,
    /// Configuration failures (exit code 60)
    Config = 60,
    /// Local I/O failures (exit code 70)
    Io = 70,
}

impl CpfError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            CpfError::Transport(_) => FailureKind::Transport,
            CpfError::Protocol(_) => FailureKind::Protocol,
            CpfError::Json(_) => FailureKind::Protocol,
            CpfError::NotReady { .. } => FailureKind::NotReady,
            CpfError::UnsupportedInput(_) => FailureKind::UnsupportedInput,
            CpfError::Config(_) => FailureKind::Config,
            CpfError::Io(_) => FailureKind::Io,
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.failure_kind() as i32
    }

    /// HTTP status code, when the failure was a non-success response.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CpfError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Result type for client operations
pub type CpfResult<T> = Result<T, CpfError>;
