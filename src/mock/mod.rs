//! Mock CPF Server
//!
//! An in-process server implementing the CPF REST routes the client uses,
//! with failure injection for testing error paths.
//!
//! # Routes
//!
//! - `GET /ws/apps/`: registered application names
//! - `GET /ws/apps/{app}/{single,multiple,instant}/`: application specification
//! - `POST /ws/apps/{app}/{single,multiple}/`: create a job, answer `{"id": url}`
//! - `GET /ws/jobs/`, `GET /ws/apps/{app}/jobs/`: job listings
//! - `GET /ws/jobs/{id}/`: status document; each lookup advances the progression
//! - `POST /ws/jobs/{id}/cancel`: cancel
//! - `DELETE /ws/jobs/{id}/`: delete (404 once gone)
//! - `GET /ws/jobs/{id}/results/`: result descriptors
//! - `GET /ws/jobs/{id}/results/{n}`: result payload

mod failure;
mod server;
mod state;

pub use failure::{FailureConfig, FailureInjector, FailureMode, RouteKey};
pub use server::{MockServer, MOCK_BASE_URL};
pub use state::{MockJob, MockResult, MockState, RecordedRequest, RecordedUpload};
