//! Digest-authenticated HTTP transport
//!
//! Sends requests with `reqwest::blocking` and answers HTTP digest
//! challenges with `digest_auth`. The last challenge is cached so later
//! requests authenticate pre-emptively with an advancing nonce count; a 401
//! carrying a fresh challenge (e.g. a stale nonce) is answered once and the
//! request re-sent, with file bodies rewound.

use std::io::{Seek, SeekFrom};
use std::sync::Mutex;
use std::time::Duration;

use digest_auth::{AuthContext, HttpMethod, WwwAuthenticateHeader};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use tracing::debug;
use url::{Position, Url};

use super::{FilePart, HttpRequest, HttpResponse, Method, PartBody, Transport, TransportError};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout in seconds
    pub connect_timeout_seconds: u64,
    /// Whole-request timeout in seconds (None = no limit; result downloads can be large)
    pub request_timeout_seconds: Option<u64>,
    pub user_agent: String,
    /// Honor the `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` environment
    pub use_system_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 30,
            request_timeout_seconds: None,
            user_agent: format!("cpf-client/{}", env!("CARGO_PKG_VERSION")),
            use_system_proxy: true,
        }
    }
}

/// Digest-authenticated transport for production use
pub struct DigestTransport {
    client: Client,
    username: String,
    password: String,
    /// Last digest challenge from the server
    challenge: Mutex<Option<WwwAuthenticateHeader>>,
}

impl DigestTransport {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_config(username, password, HttpConfig::default())
    }

    pub fn with_config(
        username: impl Into<String>,
        password: impl Into<String>,
        config: HttpConfig,
    ) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .timeout(config.request_timeout_seconds.map(Duration::from_secs))
            .user_agent(config.user_agent);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::ConnectionFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            username: username.into(),
            password: password.into(),
            challenge: Mutex::new(None),
        })
    }

    /// Answer the cached challenge for this request, if there is one
    fn authorization(&self, method: Method, uri: &str) -> Result<Option<String>, TransportError> {
        let mut challenge = self.challenge.lock().unwrap_or_else(|e| e.into_inner());
        let Some(prompt) = challenge.as_mut() else {
            return Ok(None);
        };

        let context = AuthContext::new_with_method(
            self.username.as_str(),
            self.password.as_str(),
            uri,
            Option::<&[u8]>::None,
            HttpMethod::from(method.as_str()),
        );
        let answer = prompt
            .respond(&context)
            .map_err(|e| TransportError::Auth(e.to_string()))?;

        Ok(Some(answer.to_header_string()))
    }

    fn remember_challenge(&self, header: &str) -> Result<(), TransportError> {
        let prompt = digest_auth::parse(header).map_err(|e| TransportError::Auth(e.to_string()))?;
        *self.challenge.lock().unwrap_or_else(|e| e.into_inner()) = Some(prompt);
        Ok(())
    }

    fn build(&self, request: &HttpRequest, authorization: Option<&str>) -> Result<RequestBuilder, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        if let Some(ref upload) = request.upload {
            let mut form = multipart::Form::new();
            for (name, value) in request.form.iter() {
                form = form.text(name.to_string(), value.to_string());
            }
            form = form.part(upload.field.clone(), file_part(upload)?);
            builder = builder.multipart(form);
        } else if !request.form.is_empty() {
            let fields: Vec<(&str, &str)> = request.form.iter().collect();
            builder = builder.form(&fields);
        }

        Ok(builder)
    }

    fn execute(&self, request: &HttpRequest, authorization: Option<&str>) -> Result<Response, TransportError> {
        self.build(request, authorization)?
            .send()
            .map_err(map_reqwest_error)
    }
}

impl Transport for DigestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let uri = request_uri(&request.url)?;
        let authorization = self.authorization(request.method, &uri)?;

        debug!(
            method = %request.method,
            url = %request.url,
            preemptive_auth = authorization.is_some(),
            "sending request"
        );

        let response = self.execute(&request, authorization.as_deref())?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return into_response(response);
        }

        let challenge = digest_challenge(
            response
                .headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        );
        let Some(challenge) = challenge else {
            return into_response(response);
        };

        debug!(url = %request.url, "answering digest challenge");
        self.remember_challenge(&challenge)?;
        let authorization = self.authorization(request.method, &uri)?;
        into_response(self.execute(&request, authorization.as_deref())?)
    }
}

/// Build the multipart part for an upload; file bodies are read from the start
fn file_part(upload: &FilePart) -> Result<multipart::Part, TransportError> {
    let part = match upload.body {
        PartBody::File(ref file) => {
            let mut handle = file.try_clone()?;
            handle.seek(SeekFrom::Start(0))?;
            let length = handle.metadata()?.len();
            multipart::Part::reader_with_length(handle, length)
        }
        PartBody::Bytes(ref bytes) => multipart::Part::bytes(bytes.clone()),
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &upload.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("part header {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidRequest(format!("part header value {}: {}", value, e)))?;
        headers.insert(name, value);
    }

    let part = part
        .file_name(upload.file_name.clone())
        .mime_str(&upload.content_type)
        .map_err(|e| TransportError::InvalidRequest(format!("content type {}: {}", upload.content_type, e)))?
        .headers(headers);

    Ok(part)
}

/// Path and query of the URL, as used in the digest `uri` parameter
fn request_uri(url: &str) -> Result<String, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::InvalidRequest(format!("{}: {}", url, e)))?;
    Ok(parsed[Position::BeforePath..].to_string())
}

/// First `WWW-Authenticate` value offering the Digest scheme
fn digest_challenge<'a>(mut values: impl Iterator<Item = &'a str>) -> Option<String> {
    values
        .find(|value| {
            value
                .trim_start()
                .get(..6)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        })
        .map(str::to_string)
}

fn into_response(response: Response) -> Result<HttpResponse, TransportError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response.bytes().map_err(map_reqwest_error)?.to_vec();

    Ok(HttpResponse { status, headers, body })
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::ConnectionFailed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::thread;

    const CHALLENGE: &str = "HTTP/1.1 401 Unauthorized\r\n\
        WWW-Authenticate: Digest realm=\"cpf\", nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", qop=\"auth\"\r\n\
        Content-Length: 0\r\nConnection: close\r\n\r\n";
    const OK: &str = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
        Content-Length: 2\r\nConnection: close\r\n\r\n{}";

    /// A request as it arrived on the wire
    struct Received {
        head: String,
        body: Vec<u8>,
    }

    impl Received {
        fn header(&self, name: &str) -> Option<&str> {
            self.head.lines().skip(1).find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
            })
        }

        fn body_text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    fn read_request(stream: &TcpStream) -> std::io::Result<Received> {
        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 || line == "\r\n" {
                break;
            }
            head.push_str(&line);
        }

        let mut received = Received { head, body: Vec::new() };
        if let Some(length) = received.header("Content-Length") {
            let mut body = vec![0; length.parse().unwrap()];
            reader.read_exact(&mut body)?;
            received.body = body;
        } else if received
            .header("Transfer-Encoding")
            .is_some_and(|value| value.eq_ignore_ascii_case("chunked"))
        {
            loop {
                let mut size = String::new();
                reader.read_line(&mut size)?;
                let size = usize::from_str_radix(size.trim(), 16).unwrap();
                let mut chunk = vec![0; size + 2];
                reader.read_exact(&mut chunk)?;
                if size == 0 {
                    break;
                }
                received.body.extend_from_slice(&chunk[..size]);
            }
        }
        Ok(received)
    }

    /// Answers one connection per canned response, in order
    fn serve(responses: Vec<&'static str>) -> (String, Arc<Mutex<Vec<Received>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let request = read_request(&stream).unwrap();
                log.lock().unwrap().push(request);
                stream.write_all(response.as_bytes()).unwrap();
            }
        });

        (base, received)
    }

    fn loopback_transport() -> DigestTransport {
        let config = HttpConfig {
            connect_timeout_seconds: 5,
            request_timeout_seconds: Some(10),
            use_system_proxy: false,
            ..HttpConfig::default()
        };
        DigestTransport::with_config("cpftest", "cpftest", config).unwrap()
    }

    #[test]
    fn test_upload_retried_with_digest_and_rewound_file() {
        let (base, received) = serve(vec![CHALLENGE, OK, OK]);
        let transport = loopback_transport();

        let contents = "mapTileId\n92g025\n92g026\n";
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();

        let mut request = HttpRequest::post(format!("{}/cpf/ws/apps/MapTileByTileId/multiple/", base));
        request.form.set("numRequests", "2");
        request.upload = Some(FilePart {
            field: "inputData".to_string(),
            file_name: "requests.csv".to_string(),
            content_type: "text/csv".to_string(),
            headers: vec![("Expires".to_string(), "0".to_string())],
            body: PartBody::File(file),
        });

        let response = transport.send(request).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "{}");

        {
            let received = received.lock().unwrap();
            assert_eq!(received.len(), 2);
            assert!(received[0].header("Authorization").is_none());

            let retry = &received[1];
            assert!(retry.head.starts_with("POST /cpf/ws/apps/MapTileByTileId/multiple/ HTTP/1.1"));
            let authorization = retry.header("Authorization").unwrap();
            assert!(authorization.starts_with("Digest "));
            assert!(authorization.contains("uri=\"/cpf/ws/apps/MapTileByTileId/multiple/\""));
            assert!(retry
                .header("Content-Type")
                .unwrap()
                .starts_with("multipart/form-data; boundary="));

            let body = retry.body_text();
            assert!(body.contains("name=\"inputData\""));
            assert!(body.contains("filename=\"requests.csv\""));
            assert!(body.to_ascii_lowercase().contains("expires: 0"));
            assert!(body.contains("name=\"numRequests\""));
            assert_eq!(body.matches(contents).count(), 1);
        }

        // the cached challenge answers the next request up front
        let response = transport.send(HttpRequest::get(format!("{}/cpf/ws/apps/", base))).unwrap();
        assert_eq!(response.status, 200);
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 3);
        assert!(received[2].header("Authorization").unwrap().starts_with("Digest "));
    }

    #[test]
    fn test_form_fields_alone_are_urlencoded() {
        let (base, received) = serve(vec![OK]);
        let transport = loopback_transport();

        let mut request = HttpRequest::post(format!("{}/cpf/ws/apps/MapTileByTileId/single/", base));
        request.form.set("numRequests", "2");
        request.form.set("media", "json");

        assert_eq!(transport.send(request).unwrap().status, 200);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].header("Content-Type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(received[0].body_text(), "numRequests=2&media=json");
        assert!(received[0].header("Authorization").is_none());
    }

    #[test]
    fn test_401_without_digest_challenge_is_returned() {
        let (base, received) = serve(vec![
            "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"cpf\"\r\n\
             Content-Length: 0\r\nConnection: close\r\n\r\n",
        ]);
        let transport = loopback_transport();

        let response = transport.send(HttpRequest::get(format!("{}/cpf/ws/jobs/", base))).unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_request_uri_keeps_query() {
        assert_eq!(
            request_uri("http://localhost:8336/cpf/ws/jobs/1/results/?intermediate=true").unwrap(),
            "/cpf/ws/jobs/1/results/?intermediate=true"
        );
        assert_eq!(request_uri("http://localhost/").unwrap(), "/");
    }

    #[test]
    fn test_request_uri_rejects_relative() {
        assert!(matches!(
            request_uri("jobs/1/"),
            Err(TransportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_digest_challenge_selection() {
        let values = vec![
            "Basic realm=\"cpf\"",
            "Digest realm=\"cpf\", nonce=\"abc\", qop=\"auth\"",
        ];
        assert_eq!(
            digest_challenge(values.into_iter()).as_deref(),
            Some("Digest realm=\"cpf\", nonce=\"abc\", qop=\"auth\"")
        );
        assert_eq!(digest_challenge(vec!["Basic realm=\"x\""].into_iter()), None);
        assert_eq!(digest_challenge(vec!["dig"].into_iter()), None);
    }

    #[test]
    fn test_preemptive_authorization_after_challenge() {
        let transport = DigestTransport::new("cpftest", "cpftest").unwrap();
        assert_eq!(transport.authorization(Method::Get, "/cpf/ws/apps/").unwrap(), None);

        transport
            .remember_challenge("Digest realm=\"cpf\", nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", qop=\"auth\"")
            .unwrap();

        let header = transport
            .authorization(Method::Get, "/cpf/ws/apps/")
            .unwrap()
            .unwrap();
        assert!(header.starts_with("Digest "));
        assert!(header.contains("username=\"cpftest\""));
        assert!(header.contains("uri=\"/cpf/ws/apps/\""));
    }

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout_seconds, 30);
        assert_eq!(config.request_timeout_seconds, None);
        assert!(config.user_agent.starts_with("cpf-client/"));
        assert!(config.use_system_proxy);
    }
}
