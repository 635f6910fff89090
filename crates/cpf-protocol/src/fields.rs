//! Field, form and query names used on the wire.

// Job descriptor / status document
pub const ID: &str = "id";
pub const JOB_STATUS: &str = "jobStatus";
pub const STATUS: &str = "status";
pub const SECONDS_TO_WAIT_FOR_STATUS_CHECK: &str = "secondsToWaitForStatusCheck";
pub const NUM_SUBMITTED_REQUESTS: &str = "numSubmittedRequests";
pub const NUM_COMPLETED_REQUESTS: &str = "numCompletedRequests";
pub const NUM_FAILED_REQUESTS: &str = "numFailedRequests";
pub const RESULTS_URL: &str = "resultsUrl";
pub const BUSINESS_APPLICATION_NAME: &str = "businessApplicationName";

// Collections
pub const RESOURCES: &str = "resources";
pub const RESOURCE_URI: &str = "resourceUri";
pub const BATCH_JOB_RESULT_TYPE: &str = "batchJobResultType";
pub const BATCH_JOB_RESULT_CONTENT_TYPE: &str = "batchJobResultContentType";
pub const BATCH_JOB_URL: &str = "batchJobUrl";

// Job creation form
pub const INPUT_DATA: &str = "inputData";
pub const INPUT_DATA_URL: &str = "inputDataUrl";
pub const INPUT_DATA_CONTENT_TYPE: &str = "inputDataContentType";
pub const RESULT_DATA_CONTENT_TYPE: &str = "resultDataContentType";
pub const NUM_REQUESTS: &str = "numRequests";
pub const MEDIA: &str = "media";

// Query
pub const INTERMEDIATE: &str = "intermediate";
