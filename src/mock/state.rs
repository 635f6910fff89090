//! Mock Server State Management
//!
//! Manages applications, jobs, results and the request log for the mock
//! server.

use std::collections::BTreeMap;
use std::io::Read;

use cpf_protocol::{fields, JobStatus, JsonObject, ResultType};
use serde_json::{json, Value};

use crate::transport::{FormData, HttpRequest, Method, PartBody};

/// Status progression for jobs created through the API
pub const DEFAULT_PROGRESSION: &[&str] = &["submitted", "processing", "resultsCreated"];

/// Default `secondsToWaitForStatusCheck` in status documents
pub const DEFAULT_SECONDS_TO_WAIT: f64 = 2.0;

/// A job held by the mock server
#[derive(Debug, Clone)]
pub struct MockJob {
    pub id: u64,
    pub url: String,
    pub app_name: String,
    /// Statuses reported by successive status lookups; the last one repeats
    pub statuses: Vec<String>,
    /// Index of the status the next lookup reports
    pub position: usize,
    /// Fields merged over the generated status document
    pub extra_fields: JsonObject,
    pub results: Vec<MockResult>,
    /// Form fields of the creating request
    pub form: FormData,
}

impl MockJob {
    pub fn new(id: u64, url: String, app_name: &str, statuses: &[&str]) -> Self {
        Self {
            id,
            url,
            app_name: app_name.to_string(),
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
            position: 0,
            extra_fields: JsonObject::new(),
            results: Vec::new(),
            form: FormData::new(),
        }
    }

    /// Status the next lookup reports, without advancing
    pub fn current_status(&self) -> &str {
        self.statuses
            .get(self.position)
            .or_else(|| self.statuses.last())
            .map(String::as_str)
            .unwrap_or("submitted")
    }

    /// Move to the next status in the progression
    pub fn advance(&mut self) {
        if self.position + 1 < self.statuses.len() {
            self.position += 1;
        }
    }

    /// Status document for the current status
    pub fn status_document(&self) -> JsonObject {
        let status = self.current_status();
        let completed = JobStatus::from(status).has_results();
        let num_requests = self.results.len().max(1) as i64;

        let mut document = JsonObject::new();
        document.insert(fields::ID.to_string(), json!(self.url));
        document.insert(fields::BUSINESS_APPLICATION_NAME.to_string(), json!(self.app_name));
        document.insert(fields::JOB_STATUS.to_string(), json!(status));
        document.insert(
            fields::SECONDS_TO_WAIT_FOR_STATUS_CHECK.to_string(),
            json!(DEFAULT_SECONDS_TO_WAIT),
        );
        document.insert(fields::NUM_SUBMITTED_REQUESTS.to_string(), json!(num_requests));
        document.insert(
            fields::NUM_COMPLETED_REQUESTS.to_string(),
            json!(if completed { num_requests } else { 0 }),
        );
        document.insert(fields::NUM_FAILED_REQUESTS.to_string(), json!(0));
        if completed {
            document.insert(fields::RESULTS_URL.to_string(), json!(format!("{}results/", self.url)));
        }

        for (key, value) in &self.extra_fields {
            document.insert(key.clone(), value.clone());
        }
        document
    }

    /// Body of the `results/` collection
    pub fn results_document(&self) -> Value {
        let resources: Vec<Value> = self.results.iter().map(MockResult::descriptor).collect();
        json!({ fields::RESOURCES: resources })
    }
}

/// A result resource of a mock job
#[derive(Debug, Clone)]
pub struct MockResult {
    pub url: String,
    pub result_type: ResultType,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl MockResult {
    pub fn descriptor(&self) -> Value {
        json!({
            fields::RESOURCE_URI: self.url,
            fields::BATCH_JOB_RESULT_TYPE: self.result_type.as_str(),
            fields::BATCH_JOB_RESULT_CONTENT_TYPE: self.content_type,
        })
    }
}

/// Upload part of a recorded request, with its body read out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// A request as received by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub form: FormData,
    pub upload: Option<RecordedUpload>,
}

impl RecordedRequest {
    /// Record a request, reading any upload to the end
    pub fn capture(request: HttpRequest) -> std::io::Result<Self> {
        let upload = match request.upload {
            Some(part) => {
                let body = match part.body {
                    PartBody::File(mut file) => {
                        let mut body = Vec::new();
                        file.read_to_end(&mut body)?;
                        body
                    }
                    PartBody::Bytes(bytes) => bytes,
                };
                Some(RecordedUpload {
                    field: part.field,
                    file_name: part.file_name,
                    content_type: part.content_type,
                    headers: part.headers,
                    body,
                })
            }
            None => None,
        };

        Ok(Self {
            method: request.method,
            url: request.url,
            headers: request.headers,
            form: request.form,
            upload,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Mock server state container
#[derive(Debug)]
pub struct MockState {
    /// Application names in registration order
    pub apps: Vec<String>,
    /// Jobs by numeric id
    pub jobs: BTreeMap<u64, MockJob>,
    /// Progression given to jobs created through the API
    pub progression: Vec<String>,
    /// Fixed answer for job creation, replacing the normal one
    pub create_response: Option<(u16, Value)>,
    pub requests: Vec<RecordedRequest>,
    id_counter: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            apps: Vec::new(),
            jobs: BTreeMap::new(),
            progression: DEFAULT_PROGRESSION.iter().map(|s| s.to_string()).collect(),
            create_response: None,
            requests: Vec::new(),
            id_counter: 0,
        }
    }
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next job id
    pub fn next_id(&mut self) -> u64 {
        self.id_counter += 1;
        self.id_counter
    }

    pub fn job_by_url(&self, url: &str) -> Option<&MockJob> {
        self.jobs.values().find(|job| job.url == url)
    }

    pub fn job_by_url_mut(&mut self, url: &str) -> Option<&mut MockJob> {
        self.jobs.values_mut().find(|job| job.url == url)
    }

    pub fn remove_job(&mut self, url: &str) -> Option<MockJob> {
        let id = self.job_by_url(url)?.id;
        self.jobs.remove(&id)
    }
}
