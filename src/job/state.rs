//! Status cache state machine
//!
//! Unknown → Polling(doc) → ... → Terminal(doc)
//!
//! A job leaves `Polling` once a fetched document reports `resultsCreated`
//! or `downloadInitiated` in `jobStatus`. A `Terminal` cache is served
//! without further network calls.

use cpf_protocol::{JobStatus, StatusDocument};

/// Last-known status of a job
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StatusCache {
    /// Never polled (or every lookup so far returned 404)
    #[default]
    Unknown,
    /// Last document fetched; the job can still change
    Polling(StatusDocument),
    /// Results exist; the document is not refreshed again
    Terminal(StatusDocument),
}

impl StatusCache {
    /// Transition on a freshly fetched status document
    pub fn observe(self, document: StatusDocument) -> Self {
        let terminal = document
            .job_status()
            .is_some_and(|status| status.has_results());

        if terminal {
            StatusCache::Terminal(document)
        } else {
            StatusCache::Polling(document)
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusCache::Terminal(_))
    }

    pub fn document(&self) -> Option<&StatusDocument> {
        match self {
            StatusCache::Unknown => None,
            StatusCache::Polling(doc) | StatusCache::Terminal(doc) => Some(doc),
        }
    }

    /// `jobStatus` of the cached document
    pub fn job_status(&self) -> Option<JobStatus> {
        self.document().and_then(StatusDocument::job_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> StatusDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unknown_by_default() {
        let cache = StatusCache::default();
        assert_eq!(cache, StatusCache::Unknown);
        assert!(cache.document().is_none());
        assert!(!cache.is_terminal());
    }

    #[test]
    fn test_non_terminal_status_keeps_polling() {
        let cache = StatusCache::Unknown.observe(doc(json!({"jobStatus": "processing"})));
        assert!(matches!(cache, StatusCache::Polling(_)));
        assert_eq!(cache.job_status(), Some(JobStatus::Processing));

        let cache = cache.observe(doc(json!({"jobStatus": "processed"})));
        assert!(!cache.is_terminal());
        assert_eq!(cache.job_status(), Some(JobStatus::Processed));
    }

    #[test]
    fn test_results_created_is_terminal() {
        let cache = StatusCache::Unknown
            .observe(doc(json!({"jobStatus": "creatingResults"})))
            .observe(doc(json!({"jobStatus": "resultsCreated", "numFailedRequests": 0})));
        assert!(cache.is_terminal());
        assert_eq!(cache.job_status(), Some(JobStatus::ResultsCreated));
    }

    #[test]
    fn test_download_initiated_is_terminal() {
        let cache = StatusCache::Unknown.observe(doc(json!({"jobStatus": "downloadInitiated"})));
        assert!(cache.is_terminal());
    }

    #[test]
    fn test_cancelled_and_missing_status_are_not_terminal() {
        assert!(!StatusCache::Unknown
            .observe(doc(json!({"jobStatus": "cancelled"})))
            .is_terminal());
        assert!(!StatusCache::Unknown
            .observe(doc(json!({"status": "resultsCreated"})))
            .is_terminal());
    }
}
