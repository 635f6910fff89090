//! CPF client: job creation and discovery
//!
//! All three submission modes funnel into one finishing step that asks for
//! JSON, merges the caller's parameters, sets `resultDataContentType` and
//! requires an `id` (the new job's URL) in the response.
//!
//! The client owns the authenticated transport. Every [`Job`] and
//! [`JobResult`](crate::job::JobResult) borrows it to send requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use cpf_protocol::{fields, resources, JsonObject, ProtocolError, SubmissionMode, MEDIA_JSON};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{CpfError, CpfResult};
use crate::input::InputSource;
use crate::job::Job;
use crate::timeout::{Clock, SystemClock};
use crate::transport::{
    DigestTransport, FilePart, HttpConfig, HttpRequest, HttpResponse, PartBody, Transport,
};
use crate::url::{app_path, BaseUrl};

/// Named job parameters, sent as form fields.
///
/// String values are sent verbatim; other values use their JSON text.
pub type Parameters = BTreeMap<String, Value>;

/// File name used for uploaded structured request lists
const STRUCTURED_REQUESTS_FILE_NAME: &str = "data.json";

pub struct CpfClient {
    base_url: BaseUrl,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CpfClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpfClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CpfClient {
    /// Client with a digest-authenticated HTTP session
    pub fn new(url: &str, username: &str, password: &str) -> CpfResult<Self> {
        let transport = DigestTransport::new(username, password)?;
        Ok(Self::with_transport(url, Arc::new(transport)))
    }

    pub fn from_config(config: &ClientConfig) -> CpfResult<Self> {
        let http = HttpConfig {
            connect_timeout_seconds: config.connect_timeout_seconds,
            ..HttpConfig::default()
        };
        let transport = DigestTransport::with_config(
            config.username.as_str(),
            config.password.as_str(),
            http,
        )?;
        Ok(Self::with_transport(&config.url, Arc::new(transport)))
    }

    pub fn with_transport(url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: BaseUrl::new(url),
            transport,
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Replace the clock used by completion polling
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn send(&self, request: HttpRequest) -> CpfResult<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        let response = self.transport.send(request)?;
        debug!(%method, %url, status = response.status, "response received");
        Ok(response)
    }

    /// GET a JSON object, requiring HTTP 200
    pub fn get_json_resource(&self, url: &str) -> CpfResult<JsonObject> {
        let response = self
            .send(HttpRequest::get(url).accept_json())?
            .error_for_status(|status| status == 200)?;
        json_object(&response)
    }

    /// Wrap a known job URL
    pub fn job(&self, url: impl Into<String>) -> Job<'_> {
        Job::new(self, url.into())
    }

    // ------------------------------------------------------------------
    // Job creation
    // ------------------------------------------------------------------

    /// Create a job holding one request built from `parameters`
    pub fn create_job_single(
        &self,
        app_name: &str,
        parameters: &Parameters,
        result_content_type: &str,
    ) -> CpfResult<Job<'_>> {
        let url = self.base_url.join(&app_path(app_name, SubmissionMode::Single));
        self.new_job(HttpRequest::post(url), parameters, result_content_type)
    }

    /// Create a job whose requests are read from `input_data`.
    ///
    /// `input_data` is a local file path, an `http`/`https` URL the server
    /// fetches itself, or a `file://` URL. It is resolved before anything is
    /// sent.
    pub fn create_job_multiple(
        &self,
        app_name: &str,
        input_data: &str,
        input_data_content_type: &str,
        parameters: &Parameters,
        num_requests: Option<u64>,
        result_content_type: &str,
    ) -> CpfResult<Job<'_>> {
        let source = InputSource::resolve(input_data)?;
        self.create_job_multiple_from(
            app_name,
            &source,
            input_data,
            input_data_content_type,
            parameters,
            num_requests,
            result_content_type,
        )
    }

    /// Create a multiple-request job from an already resolved source.
    ///
    /// `display_name` becomes the uploaded part's file name.
    #[allow(clippy::too_many_arguments)]
    pub fn create_job_multiple_from(
        &self,
        app_name: &str,
        source: &InputSource,
        display_name: &str,
        input_data_content_type: &str,
        parameters: &Parameters,
        num_requests: Option<u64>,
        result_content_type: &str,
    ) -> CpfResult<Job<'_>> {
        let url = self.base_url.join(&app_path(app_name, SubmissionMode::Multiple));
        let mut request = HttpRequest::post(url);
        request
            .form
            .set(fields::INPUT_DATA_CONTENT_TYPE, input_data_content_type);
        if let Some(num_requests) = num_requests {
            request.form.set(fields::NUM_REQUESTS, num_requests.to_string());
        }

        match source {
            InputSource::LocalFile(_) => {
                let file = source.open()?.ok_or_else(|| {
                    CpfError::UnsupportedInput(display_name.to_string())
                })?;
                request.upload = Some(FilePart {
                    field: fields::INPUT_DATA.to_string(),
                    file_name: display_name.to_string(),
                    content_type: input_data_content_type.to_string(),
                    headers: vec![("Expires".to_string(), "0".to_string())],
                    body: PartBody::File(file),
                });
            }
            InputSource::RemoteUrl { text, .. } => {
                request.form.set(fields::INPUT_DATA_URL, text.as_str());
            }
        }

        debug!(app = app_name, input = %source, "creating multiple-request job");
        self.new_job(request, parameters, result_content_type)
    }

    /// Create a job from raw, pre-serialized request bodies.
    ///
    /// Every body is written to the same `inputData` field, so only the last
    /// one is sent even though `numRequests` counts all of them.
    pub fn create_job_with_opaque_resource_requests<S: AsRef<str>>(
        &self,
        app_name: &str,
        job_parameters: &Parameters,
        input_data_content_type: &str,
        result_content_type: &str,
        opaque_requests: &[S],
    ) -> CpfResult<Job<'_>> {
        if opaque_requests.len() > 1 {
            warn!(
                app = app_name,
                count = opaque_requests.len(),
                "only the last opaque request body is sent"
            );
        }

        let url = self.base_url.join(&app_path(app_name, SubmissionMode::Multiple));
        let mut request = HttpRequest::post(url);
        request
            .form
            .set(fields::NUM_REQUESTS, opaque_requests.len().to_string());
        request
            .form
            .set(fields::RESULT_DATA_CONTENT_TYPE, result_content_type);
        request
            .form
            .set(fields::INPUT_DATA_CONTENT_TYPE, input_data_content_type);
        request.form.set(fields::MEDIA, MEDIA_JSON);
        for input_data in opaque_requests {
            request.form.set(fields::INPUT_DATA, input_data.as_ref());
            request
                .form
                .set(fields::INPUT_DATA_CONTENT_TYPE, input_data_content_type);
        }

        self.new_job(request, job_parameters, result_content_type)
    }

    /// Create a job whose requests are fetched by the server from `urls`
    pub fn create_job_with_opaque_url_requests<S: AsRef<str>>(
        &self,
        app_name: &str,
        job_parameters: &Parameters,
        input_data_content_type: &str,
        result_content_type: &str,
        urls: &[S],
    ) -> CpfResult<Job<'_>> {
        let url = self.base_url.join(&app_path(app_name, SubmissionMode::Multiple));
        let mut request = HttpRequest::post(url);
        request.form.set(fields::NUM_REQUESTS, urls.len().to_string());
        request
            .form
            .set(fields::INPUT_DATA_CONTENT_TYPE, input_data_content_type);
        request.form.set(fields::MEDIA, MEDIA_JSON);
        for input_url in urls {
            request.form.append(fields::INPUT_DATA_URL, input_url.as_ref());
        }

        self.new_job(request, job_parameters, result_content_type)
    }

    /// Create a job from structured request records, uploaded as one JSON array
    pub fn create_job_with_structured_requests(
        &self,
        app_name: &str,
        job_parameters: &Parameters,
        requests: &[JsonObject],
        result_content_type: &str,
    ) -> CpfResult<Job<'_>> {
        let url = self.base_url.join(&app_path(app_name, SubmissionMode::Multiple));
        let mut request = HttpRequest::post(url);
        request.form.set(fields::NUM_REQUESTS, requests.len().to_string());
        request.form.set(fields::INPUT_DATA_CONTENT_TYPE, MEDIA_JSON);
        request.upload = Some(FilePart {
            field: fields::INPUT_DATA.to_string(),
            file_name: STRUCTURED_REQUESTS_FILE_NAME.to_string(),
            content_type: MEDIA_JSON.to_string(),
            headers: Vec::new(),
            body: PartBody::Bytes(serde_json::to_vec(requests)?),
        });

        self.new_job(request, job_parameters, result_content_type)
    }

    fn new_job(
        &self,
        mut request: HttpRequest,
        parameters: &Parameters,
        result_content_type: &str,
    ) -> CpfResult<Job<'_>> {
        request.set_header("Accept", MEDIA_JSON);
        for (name, value) in parameters {
            request.form.set(name.as_str(), form_value(value));
        }
        request
            .form
            .set(fields::RESULT_DATA_CONTENT_TYPE, result_content_type);

        debug!(url = %request.url, fields = request.form.len(), "submitting job");
        let response = self
            .send(request)?
            .error_for_status(|status| status < 400)?;

        let body = json_object(&response)?;
        let job_url = body
            .get(fields::ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(ProtocolError::missing_job_id)?;

        info!(job = job_url, "job created");
        Ok(self.job(job_url))
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Names of the business applications the user can access
    pub fn app_names(&self) -> CpfResult<Vec<String>> {
        let body = self.get_json_resource(&self.base_url.join("/ws/apps/"))?;
        Ok(resources(&body)
            .iter()
            .filter_map(|item| item.get(fields::BUSINESS_APPLICATION_NAME))
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    pub fn app_spec_instant(&self, app_name: &str) -> CpfResult<JsonObject> {
        let path = format!(
            "{}?format=json&specification=true",
            app_path(app_name, SubmissionMode::Instant)
        );
        self.get_json_resource(&self.base_url.join(&path))
    }

    pub fn app_spec_multiple(&self, app_name: &str) -> CpfResult<JsonObject> {
        self.get_json_resource(&self.base_url.join(&app_path(app_name, SubmissionMode::Multiple)))
    }

    pub fn app_spec_single(&self, app_name: &str) -> CpfResult<JsonObject> {
        self.get_json_resource(&self.base_url.join(&app_path(app_name, SubmissionMode::Single)))
    }

    /// The user's jobs, optionally limited to one application
    pub fn jobs(&self, app_name: Option<&str>) -> CpfResult<Vec<Job<'_>>> {
        let path = match app_name {
            Some(app_name) => format!("/ws/apps/{}/jobs/", app_name),
            None => "/ws/jobs/".to_string(),
        };
        let body = self.get_json_resource(&self.base_url.join(&path))?;
        Ok(resources(&body)
            .iter()
            .filter_map(|item| item.get(fields::BATCH_JOB_URL))
            .filter_map(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(|url| self.job(url))
            .collect())
    }
}

/// Decode a response body that must be a JSON object
pub(crate) fn json_object(response: &HttpResponse) -> CpfResult<JsonObject> {
    match response.json::<Value>()? {
        Value::Object(object) => Ok(object),
        other => Err(ProtocolError::UnexpectedBody(other.to_string()).into()),
    }
}

/// Text sent for a parameter value
fn form_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockServer;
    use crate::transport::Method;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_form_value() {
        assert_eq!(form_value(&json!("92g025")), "92g025");
        assert_eq!(form_value(&json!(3)), "3");
        assert_eq!(form_value(&json!(true)), "true");
        assert_eq!(form_value(&Value::Null), "");
    }

    #[test]
    fn test_create_job_single_request_shape() {
        let server = MockServer::new();
        let client = server.client();

        let job = client
            .create_job_single("MapTileByTileId", &params(json!({"mapTileId": "92g025"})), "application/json")
            .unwrap();
        assert_eq!(job.url(), server.job_url(1));

        let request = server.last_request().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, server.url("/ws/apps/MapTileByTileId/single/"));
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert_eq!(request.form.get("mapTileId"), Some("92g025"));
        assert_eq!(request.form.get("resultDataContentType"), Some("application/json"));
        assert!(request.upload.is_none());
    }

    #[test]
    fn test_new_job_requires_id() {
        let server = MockServer::new();
        server.set_create_response(200, json!({"message": "accepted"}));
        let client = server.client();

        let err = client
            .create_job_single("MapTileByTileId", &Parameters::new(), "text/csv")
            .unwrap_err();
        assert!(matches!(err, CpfError::Protocol(_)));
        assert!(err.to_string().contains("job creation response missing id"));
    }

    #[test]
    fn test_new_job_propagates_http_errors() {
        let server = MockServer::new();
        server.set_create_response(400, json!({"error": "unknown parameter"}));
        let client = server.client();

        let err = client
            .create_job_single("MapTileByTileId", &Parameters::new(), "text/csv")
            .unwrap_err();
        assert_eq!(err.http_status(), Some(400));
    }

    #[test]
    fn test_opaque_requests_keep_last_body() {
        let server = MockServer::new();
        let client = server.client();

        client
            .create_job_with_opaque_resource_requests(
                "Geocoder",
                &params(json!({"srid": 3005})),
                "application/json",
                "text/csv",
                &["{\"a\":1}", "{\"a\":2}", "{\"a\":3}"],
            )
            .unwrap();

        let request = server.last_request().unwrap();
        assert_eq!(request.url, server.url("/ws/apps/Geocoder/multiple/"));
        assert_eq!(request.form.get("numRequests"), Some("3"));
        assert_eq!(request.form.get_all("inputData"), vec!["{\"a\":3}"]);
        assert_eq!(request.form.get("media"), Some("application/json"));
        assert_eq!(request.form.get("srid"), Some("3005"));
        assert_eq!(request.form.get("resultDataContentType"), Some("text/csv"));
    }

    #[test]
    fn test_opaque_url_requests_are_repeated() {
        let server = MockServer::new();
        let client = server.client();

        client
            .create_job_with_opaque_url_requests(
                "Geocoder",
                &Parameters::new(),
                "text/csv",
                "application/json",
                &["http://data/1.csv", "http://data/2.csv"],
            )
            .unwrap();

        let request = server.last_request().unwrap();
        assert_eq!(request.form.get("numRequests"), Some("2"));
        assert_eq!(
            request.form.get_all("inputDataUrl"),
            vec!["http://data/1.csv", "http://data/2.csv"]
        );
    }

    #[test]
    fn test_structured_requests_upload_json() {
        let server = MockServer::new();
        let client = server.client();
        let requests: Vec<JsonObject> = vec![
            json!({"mapTileId": "92g025"}).as_object().cloned().unwrap(),
            json!({"mapTileId": "92g026"}).as_object().cloned().unwrap(),
        ];

        client
            .create_job_with_structured_requests("MapTileByTileId", &Parameters::new(), &requests, "text/csv")
            .unwrap();

        let request = server.last_request().unwrap();
        assert_eq!(request.form.get("numRequests"), Some("2"));
        let upload = request.upload.unwrap();
        assert_eq!(upload.field, "inputData");
        assert_eq!(upload.file_name, "data.json");
        assert_eq!(upload.content_type, "application/json");
        let sent: Value = serde_json::from_slice(&upload.body).unwrap();
        assert_eq!(sent, json!([{"mapTileId": "92g025"}, {"mapTileId": "92g026"}]));
    }

    #[test]
    fn test_app_names_and_specs() {
        let server = MockServer::new();
        server.add_app("MapTileByTileId");
        server.add_app("Geocoder");
        let client = server.client();

        assert_eq!(client.app_names().unwrap(), vec!["MapTileByTileId", "Geocoder"]);

        let spec = client.app_spec_instant("Geocoder").unwrap();
        assert_eq!(spec["businessApplicationName"], "Geocoder");
        assert_eq!(
            server.last_request().unwrap().url,
            server.url("/ws/apps/Geocoder/instant/?format=json&specification=true")
        );

        assert!(client.app_spec_single("Geocoder").is_ok());
        assert!(client.app_spec_multiple("Geocoder").is_ok());
        assert_eq!(client.app_spec_single("Missing").unwrap_err().http_status(), Some(404));
    }

    #[test]
    fn test_jobs_listing() {
        let server = MockServer::new();
        server.add_app("Geocoder");
        server.add_app("MapTileByTileId");
        let client = server.client();

        client.create_job_single("Geocoder", &Parameters::new(), "text/csv").unwrap();
        client.create_job_single("MapTileByTileId", &Parameters::new(), "text/csv").unwrap();

        let all = client.jobs(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id(), "1");

        let geocoder = client.jobs(Some("Geocoder")).unwrap();
        assert_eq!(geocoder.len(), 1);
        assert_eq!(geocoder[0].url(), server.job_url(1));
    }
}
