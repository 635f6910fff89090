//! Mock Server Implementation
//!
//! An in-process CPF server behind the [`Transport`] trait. Requests are
//! routed on method and path, answered from [`MockState`], and logged.

use std::sync::{Arc, Mutex};

use cpf_protocol::{fields, ResultType, MEDIA_JSON};
use serde_json::{json, Value};

use crate::client::CpfClient;
use crate::timeout::ManualClock;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};

use super::failure::{FailureConfig, FailureInjector, FailureMode, RouteKey};
use super::state::{MockJob, MockResult, MockState, RecordedRequest};

/// Base URL the mock server answers on
pub const MOCK_BASE_URL: &str = "http://mock.cpf/cpf";

/// Configurable in-process CPF server for testing
#[derive(Clone)]
pub struct MockServer {
    base_url: String,
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MockServer {
    pub fn new() -> Self {
        Self::with_base_url(MOCK_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(MockState::new())),
            failures: Arc::new(Mutex::new(FailureInjector::new())),
        }
    }

    // === Public API for test configuration ===

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a server path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn job_url(&self, id: u64) -> String {
        self.url(&format!("/ws/jobs/{}/", id))
    }

    /// Client talking to this server, polling on virtual time
    pub fn client(&self) -> CpfClient {
        self.client_with_clock(ManualClock::new())
    }

    pub fn client_with_clock(&self, clock: ManualClock) -> CpfClient {
        CpfClient::with_transport(&self.base_url, Arc::new(self.clone())).with_clock(Arc::new(clock))
    }

    pub fn add_app(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        if !state.apps.iter().any(|app| app == name) {
            state.apps.push(name.to_string());
        }
    }

    /// Status progression for jobs created from now on
    pub fn set_progression(&self, statuses: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.progression = statuses.iter().map(|s| s.to_string()).collect();
    }

    /// Answer job creation with a fixed status and body
    pub fn set_create_response(&self, status: u16, body: Value) {
        self.state.lock().unwrap().create_response = Some((status, body));
    }

    /// Register a job directly, returning its URL
    pub fn add_job(&self, app_name: &str, statuses: &[&str]) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let url = self.job_url(id);
        state.jobs.insert(id, MockJob::new(id, url.clone(), app_name, statuses));
        url
    }

    pub fn remove_job(&self, job_url: &str) {
        self.state.lock().unwrap().remove_job(job_url);
    }

    pub fn has_job(&self, job_url: &str) -> bool {
        self.state.lock().unwrap().job_by_url(job_url).is_some()
    }

    /// Status the job's next lookup reports
    pub fn job_status(&self, job_url: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .job_by_url(job_url)
            .map(|job| job.current_status().to_string())
    }

    /// Set a field on every status document of a job
    pub fn set_status_field(&self, job_url: &str, key: &str, value: Value) {
        let mut state = self.state.lock().unwrap();
        if let Some(job) = state.job_by_url_mut(job_url) {
            job.extra_fields.insert(key.to_string(), value);
        }
    }

    /// Add a result resource to a job, returning its URL
    pub fn add_result(&self, job_url: &str, result_type: ResultType, content_type: &str, body: &str) -> String {
        let mut state = self.state.lock().unwrap();
        match state.job_by_url_mut(job_url) {
            Some(job) => {
                let url = format!("{}results/{}", job.url, job.results.len() + 1);
                job.results.push(MockResult {
                    url: url.clone(),
                    result_type,
                    content_type: content_type.to_string(),
                    body: body.as_bytes().to_vec(),
                });
                url
            }
            None => String::new(),
        }
    }

    /// Form fields the job was created with
    pub fn job_form(&self, job_url: &str) -> Option<crate::transport::FormData> {
        self.state
            .lock()
            .unwrap()
            .job_by_url(job_url)
            .map(|job| job.form.clone())
    }

    /// Fail every request on a route with an HTTP status
    pub fn fail_route(&self, method: Method, url: &str, status: u16) {
        self.inject(method, url, FailureConfig::status(status, format!("injected {}", status)));
    }

    pub fn inject(&self, method: Method, url: &str, config: FailureConfig) {
        self.failures.lock().unwrap().inject(RouteKey::new(method, url), config);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state.lock().unwrap().requests.last().cloned()
    }

    /// Number of requests with this method and exact URL
    pub fn request_count(&self, method: Method, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|request| request.method == method && request.url == url)
            .count()
    }

    // === Routing ===

    fn handle(&self, request: &RecordedRequest) -> HttpResponse {
        let Some(rest) = request.url.strip_prefix(&self.base_url) else {
            return not_found(&request.url);
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        let Some(path) = path.strip_prefix("/ws/") else {
            return not_found(&request.url);
        };
        let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();

        let mut state = self.state.lock().unwrap();
        match (request.method, segments.as_slice()) {
            (Method::Get, ["apps"]) => {
                let resources: Vec<Value> = state
                    .apps
                    .iter()
                    .map(|app| json!({ fields::BUSINESS_APPLICATION_NAME: app }))
                    .collect();
                json_response(200, &json!({ fields::RESOURCES: resources }))
            }
            (Method::Get, ["apps", app, "jobs"]) => {
                let resources: Vec<Value> = state
                    .jobs
                    .values()
                    .filter(|job| job.app_name == *app)
                    .map(|job| json!({ fields::BATCH_JOB_URL: job.url }))
                    .collect();
                json_response(200, &json!({ fields::RESOURCES: resources }))
            }
            (Method::Get, ["apps", app, mode @ ("single" | "multiple" | "instant")]) => {
                if !state.apps.iter().any(|known| known.as_str() == *app) {
                    return not_found(&request.url);
                }
                json_response(
                    200,
                    &json!({
                        fields::BUSINESS_APPLICATION_NAME: app,
                        "mode": mode,
                        "specification": query.is_some_and(|q| q.contains("specification=true")),
                    }),
                )
            }
            (Method::Post, ["apps", app, "single" | "multiple"]) => {
                if let Some((status, body)) = state.create_response.clone() {
                    return json_response(status, &body);
                }
                let id = state.next_id();
                let url = self.job_url(id);
                let progression: Vec<&str> = state.progression.iter().map(String::as_str).collect();
                let mut job = MockJob::new(id, url.clone(), app, &progression);
                job.form = request.form.clone();
                job.results.push(MockResult {
                    url: format!("{}results/1", url),
                    result_type: ResultType::StructuredResultData,
                    content_type: MEDIA_JSON.to_string(),
                    body: form_echo(request).into_bytes(),
                });
                state.jobs.insert(id, job);
                json_response(200, &json!({ fields::ID: url }))
            }
            (Method::Get, ["jobs"]) => {
                let resources: Vec<Value> = state
                    .jobs
                    .values()
                    .map(|job| json!({ fields::BATCH_JOB_URL: job.url }))
                    .collect();
                json_response(200, &json!({ fields::RESOURCES: resources }))
            }
            (Method::Get, ["jobs", _]) => {
                let url = job_resource_url(&request.url);
                match state.job_by_url_mut(&url) {
                    Some(job) => {
                        let document = job.status_document();
                        job.advance();
                        json_response(200, &Value::Object(document))
                    }
                    None => not_found(&request.url),
                }
            }
            (Method::Post, ["jobs", _, "cancel"]) => {
                let url = request.url.trim_end_matches("cancel").to_string();
                match state.job_by_url_mut(&url) {
                    Some(job) => {
                        job.statuses = vec!["cancelled".to_string()];
                        job.position = 0;
                        HttpResponse::new(200, "")
                    }
                    None => not_found(&request.url),
                }
            }
            (Method::Delete, ["jobs", _]) => match state.remove_job(&request.url) {
                Some(_) => HttpResponse::new(200, ""),
                None => not_found(&request.url),
            },
            (Method::Get, ["jobs", _, "results"]) => {
                let url = job_resource_url(&request.url);
                let url = url.trim_end_matches("results/");
                match state.job_by_url(url) {
                    Some(job) => json_response(200, &job.results_document()),
                    None => not_found(&request.url),
                }
            }
            (Method::Get, ["jobs", _, "results", _]) => {
                let url = job_resource_url(&request.url);
                let result = state
                    .jobs
                    .values()
                    .flat_map(|job| job.results.iter())
                    .find(|result| result.url == url);
                match result {
                    Some(result) => HttpResponse::new(200, result.body.clone())
                        .with_header("Content-Type", &result.content_type),
                    None => not_found(&request.url),
                }
            }
            _ => not_found(&request.url),
        }
    }
}

impl Transport for MockServer {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let route = RouteKey::new(request.method, &request.url);
        let recorded = RecordedRequest::capture(request)?;
        self.state.lock().unwrap().requests.push(recorded.clone());

        let failure = self.failures.lock().unwrap().check(&route);
        match failure {
            Some(FailureMode::Status { status, body }) => Ok(HttpResponse::new(status, body)),
            Some(FailureMode::ConnectionRefused) => Err(TransportError::ConnectionFailed(format!(
                "connection refused: {}",
                recorded.url
            ))),
            None => Ok(self.handle(&recorded)),
        }
    }
}

/// URL without its query string
fn job_resource_url(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string()).with_header("Content-Type", MEDIA_JSON)
}

fn not_found(url: &str) -> HttpResponse {
    HttpResponse::new(404, format!("Not found: {}", url))
}

/// Structured result body: the creating request's form fields as JSON
/// One structured record echoing the creation form
fn form_echo(request: &RecordedRequest) -> String {
    let mut record = serde_json::Map::new();
    record.insert("sequenceNumber".to_string(), json!(1));
    for (key, value) in request.form.iter() {
        record.insert(key.to_string(), Value::String(value.to_string()));
    }
    json!({ "items": [record] }).to_string()
}
