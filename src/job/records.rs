//! Decoding result payloads into records
//!
//! Structured and error results hold one record per request. JSON bodies
//! are either an array of objects, an object with an `items` array, or a
//! single object. CSV and TSV bodies carry a header row; every value comes
//! back as a string.

use cpf_protocol::{JsonObject, ProtocolError};
use serde_json::Value;

const ITEMS: &str = "items";

/// Media type without parameters, lowercased
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn unreadable(content_type: &str, reason: impl ToString) -> ProtocolError {
    ProtocolError::UnreadableRecords {
        content_type: content_type.to_string(),
        reason: reason.to_string(),
    }
}

pub(crate) fn decode_records(content_type: &str, body: &[u8]) -> Result<Vec<JsonObject>, ProtocolError> {
    let media = media_type(content_type);
    if body.iter().all(u8::is_ascii_whitespace) && is_supported(&media) {
        return Ok(Vec::new());
    }

    match media.as_str() {
        "text/csv" => delimited_records(&media, body, b','),
        "text/tab-separated-values" => delimited_records(&media, body, b'\t'),
        json if is_json(json) => json_records(&media, body),
        _ => Err(unreadable(&media, "unsupported content type")),
    }
}

fn is_json(media: &str) -> bool {
    media == "application/json" || media.ends_with("+json")
}

fn is_supported(media: &str) -> bool {
    is_json(media) || media == "text/csv" || media == "text/tab-separated-values"
}

fn json_records(media: &str, body: &[u8]) -> Result<Vec<JsonObject>, ProtocolError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| unreadable(media, e))?;
    let items = match value {
        Value::Object(mut object) => match object.remove(ITEMS) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                object.insert(ITEMS.to_string(), other);
                return Ok(vec![object]);
            }
            None => return Ok(vec![object]),
        },
        Value::Array(items) => items,
        other => return Err(unreadable(media, format!("expected records, got {}", other))),
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(object) => Ok(object),
            other => Err(unreadable(media, format!("expected a record object, got {}", other))),
        })
        .collect()
}

fn delimited_records(media: &str, body: &[u8], delimiter: u8) -> Result<Vec<JsonObject>, ProtocolError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(body);
    let headers = reader.headers().map_err(|e| unreadable(media, e))?.clone();

    reader
        .records()
        .map(|row| -> Result<JsonObject, ProtocolError> {
            let row = row.map_err(|e| unreadable(media, e))?;
            Ok(headers
                .iter()
                .zip(row.iter())
                .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
                .collect())
        })
        .collect()
}
