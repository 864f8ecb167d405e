use async_trait::async_trait;
use quiz_core::model::{Progress, UserId};
use quiz_core::policy::ProgressAccess;
use tracing::debug;

use crate::codec::encode_id_list;
use crate::repository::{AuthSession, ProgressRepository, StorageError};

use super::SqliteRepository;
use super::mapping::map_progress_row;

fn write_error(err: sqlx::Error) -> StorageError {
    match err.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        _ => StorageError::Connection(err.to_string()),
    }
}

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn fetch_progress(
        &self,
        session: &AuthSession,
        owner: UserId,
    ) -> Result<Option<Progress>, StorageError> {
        session.authorize(ProgressAccess::Select { row_owner: owner })?;

        let row = sqlx::query(
            r"
            SELECT user_id, attempts, correct, wrong_ids, seen_ids, updated_at
            FROM progress
            WHERE user_id = ?1
            LIMIT 1
            ",
        )
        .bind(owner.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(
        &self,
        session: &AuthSession,
        progress: &Progress,
    ) -> Result<(), StorageError> {
        // The key is the owner, so an existing row has the same owner as the
        // new one and the update check covers the insert as well.
        let new_owner = progress.user_id();
        let access = ProgressAccess::Update {
            existing_owner: new_owner,
            new_owner,
        };
        session.authorize(access)?;

        let wrong_ids = encode_id_list(progress.wrong_ids())?;
        let seen_ids = encode_id_list(progress.seen_ids())?;

        // One statement, so SQLite takes the write lock up front and
        // concurrent writers queue on busy_timeout instead of failing.
        sqlx::query(
            r"
            INSERT INTO progress (user_id, attempts, correct, wrong_ids, seen_ids, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id) DO UPDATE SET
                attempts = excluded.attempts,
                correct = excluded.correct,
                wrong_ids = excluded.wrong_ids,
                seen_ids = excluded.seen_ids,
                updated_at = excluded.updated_at
            ",
        )
        .bind(new_owner.to_string())
        .bind(i64::from(progress.attempts()))
        .bind(i64::from(progress.correct()))
        .bind(wrong_ids)
        .bind(seen_ids)
        .bind(progress.updated_at())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        debug!(
            user_id = %new_owner,
            operation = access.operation(),
            attempts = progress.attempts(),
            "progress row written"
        );
        Ok(())
    }
}
