use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{Progress, QuestionId, UserId};
use quiz_core::policy::ProgressAccess;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::codec::decode_id_value;
use crate::repository::{AuthSession, ProgressRepository, StorageError};

use super::{RemoteBackend, error_from_response, network_error};

const PROGRESS_PATH: &str = "/rest/v1/progress";

/// Row as returned by the REST endpoint. Nullable columns are tolerated.
#[derive(Debug, Deserialize)]
struct ProgressRow {
    user_id: UserId,
    #[serde(default)]
    attempts: Option<i64>,
    #[serde(default)]
    correct: Option<i64>,
    #[serde(default)]
    wrong_ids: Value,
    #[serde(default)]
    seen_ids: Value,
    updated_at: DateTime<Utc>,
}

impl ProgressRow {
    fn into_progress(self) -> Result<Progress, StorageError> {
        let counter = |field: &str, v: Option<i64>| {
            u32::try_from(v.unwrap_or(0))
                .map_err(|_| StorageError::Serialization(format!("invalid {field}: {v:?}")))
        };
        Ok(Progress::from_persisted(
            self.user_id,
            counter("attempts", self.attempts)?,
            counter("correct", self.correct)?,
            decode_id_value(&self.wrong_ids)?,
            decode_id_value(&self.seen_ids)?,
            self.updated_at,
        ))
    }
}

#[derive(Debug, Serialize)]
struct ProgressPayload<'a> {
    user_id: UserId,
    attempts: u32,
    correct: u32,
    wrong_ids: &'a [QuestionId],
    seen_ids: &'a [QuestionId],
    updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Progress> for ProgressPayload<'a> {
    fn from(p: &'a Progress) -> Self {
        Self {
            user_id: p.user_id(),
            attempts: p.attempts(),
            correct: p.correct(),
            wrong_ids: p.wrong_ids(),
            seen_ids: p.seen_ids(),
            updated_at: p.updated_at(),
        }
    }
}

#[async_trait]
impl ProgressRepository for RemoteBackend {
    async fn fetch_progress(
        &self,
        session: &AuthSession,
        owner: UserId,
    ) -> Result<Option<Progress>, StorageError> {
        session.authorize(ProgressAccess::Select { row_owner: owner })?;

        let url = self.url(PROGRESS_PATH);
        debug!(url = %url, user_id = %owner, "fetching progress");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{owner}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let rows: Vec<ProgressRow> = response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(format!("failed to parse progress rows: {e}")))?;
        rows.into_iter().next().map(ProgressRow::into_progress).transpose()
    }

    async fn upsert_progress(
        &self,
        session: &AuthSession,
        progress: &Progress,
    ) -> Result<(), StorageError> {
        // The key is the owner, so an existing row has the same owner as the
        // new one: insert and update reduce to the same check.
        let new_owner = progress.user_id();
        session.authorize(ProgressAccess::Update {
            existing_owner: new_owner,
            new_owner,
        })?;

        let url = self.url(PROGRESS_PATH);
        debug!(url = %url, user_id = %new_owner, attempts = progress.attempts(), "upserting progress");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&ProgressPayload::from(progress))
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;
    use serde_json::json;

    #[test]
    fn row_tolerates_nulls_and_string_ids() {
        let user = UserId::random();
        let row: ProgressRow = serde_json::from_value(json!({
            "user_id": user.to_string(),
            "attempts": 4,
            "correct": null,
            "wrong_ids": ["12"],
            "seen_ids": null,
            "updated_at": "2023-11-14T22:13:20+00:00"
        }))
        .unwrap();
        let progress = row.into_progress().unwrap();
        assert_eq!(progress.attempts(), 4);
        assert_eq!(progress.correct(), 0);
        assert_eq!(progress.wrong_ids(), &[QuestionId::new(12)]);
        assert!(progress.seen_ids().is_empty());
        assert_eq!(progress.updated_at(), fixed_now());
    }

    #[test]
    fn payload_serializes_ids_as_numbers() {
        let mut p = Progress::empty(UserId::random(), fixed_now());
        p.apply_attempt(QuestionId::new(3), false, fixed_now());
        let value = serde_json::to_value(ProgressPayload::from(&p)).unwrap();
        assert_eq!(value["wrong_ids"], json!([3]));
        assert_eq!(value["seen_ids"], json!([3]));
        assert_eq!(value["attempts"], json!(1));
    }
}
