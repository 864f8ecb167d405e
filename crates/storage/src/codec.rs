//! JSON encoding of the `wrong_ids` / `seen_ids` documents.
//!
//! Ids are written as plain integers. Older rows stored them as strings
//! (`["12", "47"]`), so both forms are accepted on read.

use quiz_core::model::QuestionId;
use serde_json::Value;

use crate::repository::StorageError;

/// Encodes an id list as a JSON array of integers.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails.
pub fn encode_id_list(ids: &[QuestionId]) -> Result<String, StorageError> {
    serde_json::to_string(ids).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decodes an id list stored as JSON text. An empty string reads as `[]`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the text is not a JSON array of ids.
pub fn decode_id_list(raw: &str) -> Result<Vec<QuestionId>, StorageError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))?;
    decode_id_value(&value)
}

/// Decodes an id list from an already parsed JSON value. `null` reads as `[]`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for non-array values or elements
/// that are neither non-negative integers nor numeric strings.
pub fn decode_id_value(value: &Value) -> Result<Vec<QuestionId>, StorageError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(decode_id).collect(),
        other => Err(StorageError::Serialization(format!(
            "expected id array, got {other}"
        ))),
    }
}

fn decode_id(item: &Value) -> Result<QuestionId, StorageError> {
    match item {
        Value::Number(n) => n
            .as_u64()
            .map(QuestionId::new)
            .ok_or_else(|| StorageError::Serialization(format!("invalid question id: {n}"))),
        Value::String(s) => s
            .parse::<QuestionId>()
            .map_err(|e| StorageError::Serialization(e.to_string())),
        other => Err(StorageError::Serialization(format!(
            "invalid question id: {other}"
        ))),
    }
}
