//! Payload decoding
//!
//! Turns a raw text payload into a typed record. Decoding never panics;
//! every way a payload can be unusable is a distinct [`DecodeError`]
//! variant so the driving loop can log and count it before moving on.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Reasons a payload produced no record.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("invalid field: {0}")]
    InvalidField(#[source] serde_json::Error),
}

impl DecodeError {
    /// Short label for structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "malformed",
            DecodeError::NotAnObject { .. } => "not_an_object",
            DecodeError::InvalidField(_) => "invalid_field",
        }
    }
}

/// Decode a payload into a record.
///
/// The payload must be a JSON object. Parsed scalars, arrays and `null`
/// are reported as [`DecodeError::NotAnObject`]; an object whose known
/// fields carry the wrong JSON type is [`DecodeError::InvalidField`].
pub fn decode<R: DeserializeOwned>(payload: &str) -> Result<R, DecodeError> {
    let value: Value = serde_json::from_str(payload).map_err(DecodeError::Malformed)?;

    if !value.is_object() {
        return Err(DecodeError::NotAnObject {
            found: json_kind(&value),
        });
    }

    serde_json::from_value(value).map_err(DecodeError::InvalidField)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
