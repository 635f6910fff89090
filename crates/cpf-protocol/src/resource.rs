//! Resource collections and result descriptors.

use serde_json::Value;

use crate::fields;
use crate::JsonObject;

/// Kind of a batch job result artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    StructuredResultData,
    OpaqueResultData,
    ErrorResultData,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::StructuredResultData => "structuredResultData",
            ResultType::OpaqueResultData => "opaqueResultData",
            ResultType::ErrorResultData => "errorResultData",
        }
    }
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResultType {
    type Err = crate::ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structuredResultData" | "structured" => Ok(ResultType::StructuredResultData),
            "opaqueResultData" | "opaque" => Ok(ResultType::OpaqueResultData),
            "errorResultData" | "error" => Ok(ResultType::ErrorResultData),
            _ => Err(crate::ProtocolError::UnknownValue {
                kind: "result type",
                value: s.to_string(),
            }),
        }
    }
}

/// One entry of a job's `results/` collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDescriptor {
    object: JsonObject,
}

impl ResultDescriptor {
    pub fn new(object: JsonObject) -> Self {
        Self { object }
    }

    pub fn resource_uri(&self) -> Option<&str> {
        self.object.get(fields::RESOURCE_URI).and_then(Value::as_str)
    }

    /// Raw `batchJobResultType` string.
    pub fn result_type(&self) -> Option<&str> {
        self.object
            .get(fields::BATCH_JOB_RESULT_TYPE)
            .and_then(Value::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.object
            .get(fields::BATCH_JOB_RESULT_CONTENT_TYPE)
            .and_then(Value::as_str)
    }

    pub fn is_type(&self, result_type: ResultType) -> bool {
        self.result_type() == Some(result_type.as_str())
    }

    pub fn as_object(&self) -> &JsonObject {
        &self.object
    }
}

/// The objects listed under `resources`; missing or malformed lists are empty.
pub fn resources(body: &JsonObject) -> Vec<JsonObject> {
    body.get(fields::RESOURCES)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_resources_extraction() {
        let body = object(json!({
            "resources": [
                {"resourceUri": "http://h/ws/jobs/1/results/1", "batchJobResultType": "structuredResultData"},
                "not an object",
                {"resourceUri": "http://h/ws/jobs/1/results/2", "batchJobResultType": "errorResultData"}
            ]
        }));

        let items = resources(&body);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_missing_resources_is_empty() {
        assert!(resources(&object(json!({}))).is_empty());
        assert!(resources(&object(json!({"resources": null}))).is_empty());
    }

    #[test]
    fn test_descriptor_type_match() {
        let descriptor = ResultDescriptor::new(object(json!({
            "resourceUri": "http://h/ws/jobs/1/results/1",
            "batchJobResultType": "errorResultData",
            "batchJobResultContentType": "text/csv"
        })));

        assert!(descriptor.is_type(ResultType::ErrorResultData));
        assert!(!descriptor.is_type(ResultType::StructuredResultData));
        assert_eq!(descriptor.resource_uri(), Some("http://h/ws/jobs/1/results/1"));
        assert_eq!(descriptor.content_type(), Some("text/csv"));
    }

    #[test]
    fn test_result_type_from_str() {
        assert_eq!("error".parse::<ResultType>().unwrap(), ResultType::ErrorResultData);
        assert_eq!(
            "structuredResultData".parse::<ResultType>().unwrap(),
            ResultType::StructuredResultData
        );
        assert!("bogus".parse::<ResultType>().is_err());
    }
}
