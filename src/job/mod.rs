//! Batch job handle
//!
//! A [`Job`] polls the job's status document, waits for completion within a
//! deadline and lists the job's results. Status lookups are cached through
//! [`StatusCache`]: once `jobStatus` reports results, the job is not polled
//! again.
//!
//! Completion uses two fields of the status document. While polling,
//! `jobStatus` decides; after the deadline one more lookup is made and only
//! the literal `status` field counts.

mod records;
mod result;
mod state;

use std::time::Duration;

use cpf_protocol::{fields, resources, JobStatus, JsonObject, ResultType, StatusDocument};
use tracing::debug;

use crate::client::{json_object, CpfClient};
use crate::error::{CpfError, CpfResult};
use crate::timeout::{poll_interval, PollDeadline, DEFAULT_MAX_WAIT};
use crate::transport::HttpRequest;
use crate::url::{add_intermediate, job_id_from_url};

pub use result::JobResult;
pub use state::StatusCache;

/// One server-side batch job
pub struct Job<'a> {
    client: &'a CpfClient,
    url: String,
    cache: StatusCache,
}

impl std::fmt::Debug for Job<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("url", &self.url)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<'a> Job<'a> {
    pub(crate) fn new(client: &'a CpfClient, url: String) -> Self {
        Self {
            client,
            url,
            cache: StatusCache::Unknown,
        }
    }

    /// Last path segment of the job URL
    pub fn id(&self) -> String {
        job_id_from_url(&self.url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cached_status(&self) -> &StatusCache {
        &self.cache
    }

    /// `jobStatus` of the last fetched document, without a network call
    pub fn status_summary(&self) -> Option<JobStatus> {
        self.cache.job_status()
    }

    /// Current status document.
    ///
    /// Served from the cache once results exist. A 404 yields an empty
    /// document and leaves the cache as it was.
    pub fn status(&mut self) -> CpfResult<StatusDocument> {
        if let StatusCache::Terminal(document) = &self.cache {
            return Ok(document.clone());
        }

        let response = self
            .client
            .send(HttpRequest::get(self.url.as_str()).accept_json())?;
        if response.status == 404 {
            debug!(job = %self.url, "no status available");
            return Ok(StatusDocument::empty());
        }
        let response = response.error_for_status(|status| status == 200)?;

        let document = StatusDocument::new(json_object(&response)?);
        self.cache = std::mem::take(&mut self.cache).observe(document.clone());
        Ok(document)
    }

    /// Wait up to `max_wait` (default 24 hours) for results to be created.
    pub fn is_completed(&mut self, max_wait: Option<Duration>) -> CpfResult<bool> {
        let client = self.client;
        let clock = client.clock();
        let deadline = PollDeadline::start(clock, max_wait.unwrap_or(DEFAULT_MAX_WAIT));

        while !deadline.expired(clock) {
            let document = self.status()?;
            let job_status = document.job_status();
            if job_status.as_ref().is_some_and(JobStatus::has_results) {
                return Ok(true);
            }

            let wait = deadline.clamp(clock, poll_interval(document.seconds_to_wait()));
            debug!(
                job = %self.url,
                status = job_status.as_ref().map(JobStatus::as_str).unwrap_or("unknown"),
                wait_ms = wait.as_millis() as u64,
                "job not complete"
            );
            if !wait.is_zero() {
                clock.sleep(wait);
            }
        }

        let document = self.status()?;
        Ok(document.status_field() == Some(JobStatus::ResultsCreated.as_str()))
    }

    /// Whether any request failed, after waiting for completion
    pub fn has_errors(&mut self, max_wait: Option<Duration>) -> CpfResult<bool> {
        self.is_completed(max_wait)?;
        Ok(self
            .cache
            .document()
            .and_then(StatusDocument::num_failed_requests)
            .is_some_and(|failed| failed > 0))
    }

    /// Ask the server to cancel the job
    pub fn cancel(&self) -> CpfResult<()> {
        let url = format!("{}cancel", self.url);
        self.client.send(HttpRequest::post(url))?;
        debug!(job = %self.url, "cancel requested");
        Ok(())
    }

    /// Delete the job; a job that is already gone counts as deleted
    pub fn delete(&self) -> CpfResult<()> {
        self.client
            .send(HttpRequest::delete(self.url.as_str()))?
            .error_for_status(|status| status == 200 || status == 404)?;
        debug!(job = %self.url, "job deleted");
        Ok(())
    }

    /// The job's results, optionally only those of one type.
    ///
    /// Without `intermediate`, waits for completion first and fails with
    /// [`CpfError::NotReady`] if the job did not complete in time.
    pub fn results(
        &mut self,
        max_wait: Option<Duration>,
        intermediate: bool,
        result_type: Option<ResultType>,
    ) -> CpfResult<Vec<JobResult<'a>>> {
        if !intermediate && !self.is_completed(max_wait)? {
            return Err(CpfError::NotReady {
                job_url: self.url.clone(),
            });
        }

        let url = add_intermediate(&format!("{}results/", self.url), intermediate);
        let body = self.client.get_json_resource(&url)?;

        resources(&body)
            .into_iter()
            .filter(|item| match result_type {
                Some(result_type) => {
                    item.get(fields::BATCH_JOB_RESULT_TYPE)
                        .and_then(serde_json::Value::as_str)
                        == Some(result_type.as_str())
                }
                None => true,
            })
            .map(|item| JobResult::new(self.client, item, intermediate))
            .collect()
    }

    /// First `errorResultData` result, if any
    pub fn error_result(
        &mut self,
        max_wait: Option<Duration>,
        intermediate: bool,
    ) -> CpfResult<Option<JobResult<'a>>> {
        Ok(self
            .results(max_wait, intermediate, Some(ResultType::ErrorResultData))?
            .into_iter()
            .next())
    }

    /// First `structuredResultData` result, if any
    pub fn structured_result(
        &mut self,
        max_wait: Option<Duration>,
        intermediate: bool,
    ) -> CpfResult<Option<JobResult<'a>>> {
        Ok(self
            .results(max_wait, intermediate, Some(ResultType::StructuredResultData))?
            .into_iter()
            .next())
    }

    /// Records of the first structured result; empty if there is none
    pub fn structured_records(&mut self, max_wait: Option<Duration>) -> CpfResult<Vec<JsonObject>> {
        self.first_records(max_wait, ResultType::StructuredResultData)
    }

    /// Records of the first error result; empty if there is none
    pub fn error_records(&mut self, max_wait: Option<Duration>) -> CpfResult<Vec<JsonObject>> {
        self.first_records(max_wait, ResultType::ErrorResultData)
    }

    fn first_records(&mut self, max_wait: Option<Duration>, result_type: ResultType) -> CpfResult<Vec<JsonObject>> {
        match self.results(max_wait, false, Some(result_type))?.first() {
            Some(result) => result.records(),
            None => {
                debug!(job = %self.url, result_type = result_type.as_str(), "no result to read");
                Ok(Vec::new())
            }
        }
    }
}

impl std::fmt::Display for Job<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}
