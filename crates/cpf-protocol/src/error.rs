//! Protocol violation errors.

/// The server answered with a body that does not follow the protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("{context} response missing {field}")]
    MissingField {
        context: &'static str,
        field: &'static str,
    },

    #[error("expected a JSON object, got {0}")]
    UnexpectedBody(String),

    #[error("unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("cannot read records from {content_type}: {reason}")]
    UnreadableRecords { content_type: String, reason: String },
}

impl ProtocolError {
    /// The job creation response did not carry an `id`.
    pub fn missing_job_id() -> Self {
        ProtocolError::MissingField {
            context: "job creation",
            field: crate::fields::ID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_job_id_message() {
        assert_eq!(
            ProtocolError::missing_job_id().to_string(),
            "job creation response missing id"
        );
    }

    #[test]
    fn test_unreadable_records_message() {
        let err = ProtocolError::UnreadableRecords {
            content_type: "image/png".to_string(),
            reason: "unsupported content type".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot read records from image/png: unsupported content type"
        );
    }
}
