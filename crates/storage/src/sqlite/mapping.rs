use quiz_core::model::{Progress, UserId};
use sqlx::Row;

use crate::codec::decode_id_list;
use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn counter_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_str(raw: &str) -> Result<UserId, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<Progress, StorageError> {
    let user_id = user_id_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?;
    let attempts = counter_from_i64("attempts", row.try_get("attempts").map_err(ser)?)?;
    let correct = counter_from_i64("correct", row.try_get("correct").map_err(ser)?)?;
    let wrong_ids = decode_id_list(&row.try_get::<String, _>("wrong_ids").map_err(ser)?)?;
    let seen_ids = decode_id_list(&row.try_get::<String, _>("seen_ids").map_err(ser)?)?;

    Ok(Progress::from_persisted(
        user_id,
        attempts,
        correct,
        wrong_ids,
        seen_ids,
        row.try_get("updated_at").map_err(ser)?,
    ))
}
