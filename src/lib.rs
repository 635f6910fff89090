//! CPF client - batch job submission for the CPF web service
//!
//! This crate talks to a CPF server over its REST API: it discovers
//! business applications, submits single and multiple-request jobs, polls
//! job status until results exist and fetches the result payloads.

pub mod client;
pub mod config;
pub mod error;
pub mod input;
pub mod job;
pub mod mock;
pub mod timeout;
pub mod transport;
pub mod url;

pub use client::{CpfClient, Parameters};
pub use config::{ClientConfig, EffectiveConfig};
pub use cpf_protocol::{JobStatus, JsonObject, ResultType, StatusDocument, SubmissionMode};
pub use error::{CpfError, CpfResult, FailureKind};
pub use input::InputSource;
pub use job::{Job, JobResult, StatusCache};
pub use timeout::{Clock, ManualClock, SystemClock};
pub use transport::{DigestTransport, HttpResponse, Transport, TransportError};
