//! Line-level decoding: one raw line in, one [`Entry`] or [`DecodeFailure`] out.
//!
//! Nothing here looks at other lines; parent resolution and duplicate
//! detection belong to the validator and tree builder.

use crate::entry::Entry;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

const SUMMARY_REQUIRED: &[&str] = &["summary", "leafUuid"];
const MESSAGE_REQUIRED: &[&str] = &["uuid", "message"];

/// A line that could not be turned into an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: {reason}")]
pub struct DecodeFailure {
    pub line_number: usize,
    pub raw_text: String,
    pub reason: DecodeFailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeFailureReason {
    #[error("unknown entry type: {}", .found.as_deref().unwrap_or("<missing>"))]
    UnknownType { found: Option<String> },
    #[error("missing required field: {field}")]
    MissingField { field: String },
    #[error("line is not valid UTF-8: {message}")]
    InvalidEncoding { message: String },
    #[error("invalid JSON: {message}")]
    InvalidJson { message: String },
    #[error("invalid field value: {message}")]
    InvalidField { message: String },
    #[error("line is {len} bytes, limit is {max}")]
    LineTooLong { len: usize, max: usize },
}

impl DecodeFailure {
    pub fn new(line_number: usize, raw_text: &str, reason: DecodeFailureReason) -> Self {
        Self {
            line_number,
            raw_text: raw_text.to_string(),
            reason,
        }
    }

    /// The `type` value of a line rejected only for its discriminant.
    pub fn unknown_type(&self) -> Option<&str> {
        match &self.reason {
            DecodeFailureReason::UnknownType { found } => found.as_deref(),
            _ => None,
        }
    }
}

/// Decode one line. `line_number` is 1-based and recorded on messages.
pub fn decode_line(line_number: usize, line: &str) -> Result<Entry, DecodeFailure> {
    let fail = |reason: DecodeFailureReason| DecodeFailure::new(line_number, line, reason);

    let value: Value = serde_json::from_str(line).map_err(|e| {
        fail(DecodeFailureReason::InvalidJson {
            message: e.to_string(),
        })
    })?;

    let Value::Object(object) = value else {
        return Err(fail(DecodeFailureReason::UnknownType { found: None }));
    };

    let entry_type = match object.get("type") {
        Some(Value::String(t)) => t.clone(),
        _ => return Err(fail(DecodeFailureReason::UnknownType { found: None })),
    };

    let required = match entry_type.as_str() {
        "summary" => SUMMARY_REQUIRED,
        "user" | "assistant" => MESSAGE_REQUIRED,
        _ => {
            return Err(fail(DecodeFailureReason::UnknownType {
                found: Some(entry_type),
            }));
        }
    };
    require_fields(&object, required).map_err(fail)?;

    let mut entry = typed::<Entry>(object).map_err(fail)?;
    entry.set_line_number(line_number);
    Ok(entry)
}

/// A required field that is absent or `null` counts as missing.
fn require_fields(object: &Map<String, Value>, fields: &[&str]) -> Result<(), DecodeFailureReason> {
    match fields
        .iter()
        .find(|field| object.get(**field).is_none_or(Value::is_null))
    {
        Some(field) => Err(DecodeFailureReason::MissingField {
            field: (*field).to_string(),
        }),
        None => Ok(()),
    }
}

fn typed<T: DeserializeOwned>(object: Map<String, Value>) -> Result<T, DecodeFailureReason> {
    serde_json::from_value(Value::Object(object)).map_err(|e| DecodeFailureReason::InvalidField {
        message: e.to_string(),
    })
}
