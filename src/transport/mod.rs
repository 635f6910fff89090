//! Transport Layer
//!
//! Abstracts the authenticated HTTP session for testability. Provides:
//! - Transport trait: "send a request, get back status + headers + body"
//! - HttpRequest/HttpResponse: the request and response shapes the core builds
//! - DigestTransport: digest-authenticated HTTP for production
//!
//! The in-process mock server lives in [`crate::mock`].
//!
//! A transport never interprets status codes. Deciding which codes are
//! errors is the caller's job (see [`HttpResponse::error_for_status`]).

mod http;

use std::fs::File;
use std::io;

use serde::de::DeserializeOwned;

pub use http::{DigestTransport, HttpConfig};

/// Transport trait for HTTP communication
pub trait Transport: Send + Sync {
    /// Send a request and return the raw response.
    ///
    /// Any file held by the request is released when this call returns.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Digest authentication failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// HTTP status code for non-success responses
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered form fields.
///
/// `set` behaves like a mapping (an existing key is overwritten in place);
/// `append` adds a repeated key the way a multipart list does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some(field) => field.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Body of a multipart file part
#[derive(Debug)]
pub enum PartBody {
    /// An open file, read when the request is sent
    File(File),
    Bytes(Vec<u8>),
}

/// A multipart file part
#[derive(Debug)]
pub struct FilePart {
    /// Form field name
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    /// Extra part headers
    pub headers: Vec<(String, String)>,
    pub body: PartBody,
}

/// An HTTP request as built by the client.
///
/// Requests with an upload are sent as multipart/form-data; requests with
/// only form fields are sent urlencoded; requests with neither have no body.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub form: FormData,
    pub upload: Option<FilePart>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            form: FormData::new(),
            upload: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Set a header, replacing any existing value (case-insensitive name)
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn accept_json(mut self) -> Self {
        self.set_header("Accept", cpf_protocol::MEDIA_JSON);
        self
    }
}

/// A raw HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body decoded as UTF-8 (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Fail with [`TransportError::Status`] unless `accept` holds for the status.
    pub fn error_for_status(
        self,
        accept: impl Fn(u16) -> bool,
    ) -> Result<Self, TransportError> {
        if accept(self.status) {
            Ok(self)
        } else {
            Err(TransportError::Status {
                status: self.status,
                body: self.text(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_set_overwrites_in_place() {
        let mut form = FormData::new();
        form.set("numRequests", "3");
        form.set("inputData", "first");
        form.set("inputData", "second");

        assert_eq!(form.len(), 2);
        assert_eq!(form.get("inputData"), Some("second"));
        let names: Vec<&str> = form.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["numRequests", "inputData"]);
    }

    #[test]
    fn test_form_append_repeats() {
        let mut form = FormData::new();
        form.append("inputDataUrl", "http://a/1");
        form.append("inputDataUrl", "http://a/2");

        assert_eq!(form.get_all("inputDataUrl"), vec!["http://a/1", "http://a/2"]);
        assert_eq!(form.get("inputDataUrl"), Some("http://a/1"));
    }

    #[test]
    fn test_request_headers_case_insensitive() {
        let mut request = HttpRequest::get("http://h/ws/apps/").accept_json();
        assert_eq!(request.header("accept"), Some("application/json"));

        request.set_header("ACCEPT", "text/plain");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("Accept"), Some("text/plain"));
    }

    #[test]
    fn test_error_for_status() {
        let ok = HttpResponse::new(200, "{}");
        assert!(ok.error_for_status(|s| s == 200).is_ok());

        let gone = HttpResponse::new(404, "not found");
        assert!(gone.clone().error_for_status(|s| s == 200 || s == 404).is_ok());

        match gone.error_for_status(|s| s == 200) {
            Err(TransportError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_response_json() {
        let response = HttpResponse::new(200, json!({"id": "http://h/ws/jobs/1/"}).to_string())
            .with_header("Content-Type", "application/json");
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], "http://h/ws/jobs/1/");
        assert_eq!(response.header("content-type"), Some("application/json"));
    }
}
