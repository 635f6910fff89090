//! CPF Protocol Types
//!
//! Defines the JSON vocabulary of the CPF batch job REST protocol: field
//! names, job status values, status documents and result descriptors.
//! The protocol is fixed by the server; nothing here negotiates it.

pub mod error;
pub mod fields;
pub mod resource;
pub mod status;

pub use error::ProtocolError;
pub use resource::{resources, ResultDescriptor, ResultType};
pub use status::{JobStatus, StatusDocument};

/// A decoded JSON object as returned by the server.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Media type sent with every JSON-accepting request.
pub const MEDIA_JSON: &str = "application/json";

/// Default media type for input and result data.
pub const DEFAULT_CONTENT_TYPE: &str = "text/csv";

/// Submission modes exposed by a business application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionMode {
    Single,
    Multiple,
    Instant,
}

impl SubmissionMode {
    /// Path segment used under `/ws/apps/{app}/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionMode::Single => "single",
            SubmissionMode::Multiple => "multiple",
            SubmissionMode::Instant => "instant",
        }
    }
}

impl std::fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubmissionMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(SubmissionMode::Single),
            "multiple" => Ok(SubmissionMode::Multiple),
            "instant" => Ok(SubmissionMode::Instant),
            _ => Err(ProtocolError::UnknownValue {
                kind: "submission mode",
                value: s.to_string(),
            }),
        }
    }
}
