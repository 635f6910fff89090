//! Result artifacts of a job
//!
//! A [`JobResult`] wraps one entry of the job's `results/` collection. The
//! payload is fetched only when [`JobResult::response`] or
//! [`JobResult::records`] is called, and again on every call.

use cpf_protocol::{fields, JsonObject, ProtocolError, ResultDescriptor, ResultType};

use crate::client::CpfClient;
use crate::error::CpfResult;
use crate::transport::{HttpRequest, HttpResponse};
use crate::url::add_intermediate;

use super::records::decode_records;

pub struct JobResult<'a> {
    client: &'a CpfClient,
    info: ResultDescriptor,
    url: String,
    intermediate: bool,
}

impl std::fmt::Debug for JobResult<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobResult")
            .field("url", &self.url)
            .field("result_type", &self.info.result_type())
            .field("intermediate", &self.intermediate)
            .finish()
    }
}

impl<'a> JobResult<'a> {
    pub(crate) fn new(client: &'a CpfClient, info: JsonObject, intermediate: bool) -> CpfResult<Self> {
        let info = ResultDescriptor::new(info);
        let url = info
            .resource_uri()
            .ok_or(ProtocolError::MissingField {
                context: "result descriptor",
                field: fields::RESOURCE_URI,
            })?
            .to_string();

        Ok(Self {
            client,
            info,
            url,
            intermediate,
        })
    }

    pub fn info(&self) -> &ResultDescriptor {
        &self.info
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw `batchJobResultType`
    pub fn result_type(&self) -> Option<&str> {
        self.info.result_type()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.info.content_type()
    }

    pub fn is_intermediate(&self) -> bool {
        self.intermediate
    }

    pub fn is_type(&self, result_type: ResultType) -> bool {
        self.info.is_type(result_type)
    }

    /// Fetch the result payload; anything but HTTP 200 is an error
    pub fn response(&self) -> CpfResult<HttpResponse> {
        let url = add_intermediate(&self.url, self.intermediate);
        let response = self
            .client
            .send(HttpRequest::get(url))?
            .error_for_status(|status| status == 200)?;
        Ok(response)
    }

    /// Fetch the payload and decode it into records.
    ///
    /// The response `Content-Type` picks the reader, falling back to the
    /// descriptor's content type. JSON, CSV and TSV are readable.
    pub fn records(&self) -> CpfResult<Vec<JsonObject>> {
        let response = self.response()?;
        let content_type = response
            .header("Content-Type")
            .or_else(|| self.content_type())
            .unwrap_or(DEFAULT_RECORD_TYPE);
        Ok(decode_records(content_type, &response.body)?)
    }
}

const DEFAULT_RECORD_TYPE: &str = "text/csv";
