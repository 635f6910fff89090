//! Job status values and the status document.
//!
//! The server reports status as a free-form string; the known values are
//! listed in [`JobStatus`], anything else is carried through as
//! [`JobStatus::Other`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields;
use crate::JsonObject;

/// Batch job status as reported in `jobStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Submitted,
    CreatingRequests,
    RequestsCreated,
    Processing,
    Processed,
    CreatingResults,
    ResultsCreated,
    DownloadInitiated,
    Cancelled,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::CreatingRequests => "creatingRequests",
            JobStatus::RequestsCreated => "requestsCreated",
            JobStatus::Processing => "processing",
            JobStatus::Processed => "processed",
            JobStatus::CreatingResults => "creatingResults",
            JobStatus::ResultsCreated => "resultsCreated",
            JobStatus::DownloadInitiated => "downloadInitiated",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Other(s) => s,
        }
    }

    /// Results exist and the status will not change through polling.
    pub fn has_results(&self) -> bool {
        matches!(self, JobStatus::ResultsCreated | JobStatus::DownloadInitiated)
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        match s {
            "submitted" => JobStatus::Submitted,
            "creatingRequests" => JobStatus::CreatingRequests,
            "requestsCreated" => JobStatus::RequestsCreated,
            "processing" => JobStatus::Processing,
            "processed" => JobStatus::Processed,
            "creatingResults" => JobStatus::CreatingResults,
            "resultsCreated" => JobStatus::ResultsCreated,
            "downloadInitiated" => JobStatus::DownloadInitiated,
            "cancelled" => JobStatus::Cancelled,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        JobStatus::from(s.as_str())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status document returned by a GET on a job URL.
///
/// An empty document means "no status available" (the job was not found).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusDocument(JsonObject);

impl StatusDocument {
    pub fn new(object: JsonObject) -> Self {
        Self(object)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_object(&self) -> &JsonObject {
        &self.0
    }

    pub fn into_object(self) -> JsonObject {
        self.0
    }

    /// Value of `jobStatus`, the field the server maintains.
    pub fn job_status(&self) -> Option<JobStatus> {
        self.0
            .get(fields::JOB_STATUS)
            .and_then(Value::as_str)
            .map(JobStatus::from)
    }

    /// Value of the literal `status` key.
    pub fn status_field(&self) -> Option<&str> {
        self.0.get(fields::STATUS).and_then(Value::as_str)
    }

    /// Server-suggested delay before the next status check, in seconds.
    pub fn seconds_to_wait(&self) -> Option<f64> {
        self.0
            .get(fields::SECONDS_TO_WAIT_FOR_STATUS_CHECK)
            .and_then(Value::as_f64)
    }

    pub fn num_failed_requests(&self) -> Option<i64> {
        self.0.get(fields::NUM_FAILED_REQUESTS).and_then(Value::as_i64)
    }

    pub fn num_submitted_requests(&self) -> Option<i64> {
        self.0.get(fields::NUM_SUBMITTED_REQUESTS).and_then(Value::as_i64)
    }

    pub fn num_completed_requests(&self) -> Option<i64> {
        self.0.get(fields::NUM_COMPLETED_REQUESTS).and_then(Value::as_i64)
    }

    pub fn results_url(&self) -> Option<&str> {
        self.0.get(fields::RESULTS_URL).and_then(Value::as_str)
    }
}

impl From<JsonObject> for StatusDocument {
    fn from(object: JsonObject) -> Self {
        Self(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> StatusDocument {
        match value {
            Value::Object(map) => StatusDocument::new(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_known_statuses_parse() {
        assert_eq!(JobStatus::from("resultsCreated"), JobStatus::ResultsCreated);
        assert_eq!(JobStatus::from("creatingRequests"), JobStatus::CreatingRequests);
        assert_eq!(
            JobStatus::from("archived"),
            JobStatus::Other("archived".to_string())
        );
        assert_eq!(JobStatus::Other("archived".into()).as_str(), "archived");
    }

    #[test]
    fn test_has_results() {
        assert!(JobStatus::ResultsCreated.has_results());
        assert!(JobStatus::DownloadInitiated.has_results());
        assert!(!JobStatus::Processed.has_results());
        assert!(!JobStatus::Cancelled.has_results());
    }

    #[test]
    fn test_serde_uses_wire_string() {
        let status: JobStatus = serde_json::from_value(json!("downloadInitiated")).unwrap();
        assert_eq!(status, JobStatus::DownloadInitiated);
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("downloadInitiated"));
    }

    #[test]
    fn test_document_accessors() {
        let d = doc(json!({
            "jobStatus": "processing",
            "secondsToWaitForStatusCheck": 5,
            "numSubmittedRequests": 10,
            "numCompletedRequests": 7,
            "numFailedRequests": 2
        }));

        assert_eq!(d.job_status(), Some(JobStatus::Processing));
        assert_eq!(d.status_field(), None);
        assert_eq!(d.seconds_to_wait(), Some(5.0));
        assert_eq!(d.num_submitted_requests(), Some(10));
        assert_eq!(d.num_completed_requests(), Some(7));
        assert_eq!(d.num_failed_requests(), Some(2));
        assert!(!d.is_empty());
    }

    #[test]
    fn test_empty_document() {
        let d = StatusDocument::empty();
        assert!(d.is_empty());
        assert_eq!(d.job_status(), None);
        assert_eq!(d.seconds_to_wait(), None);
    }
}
