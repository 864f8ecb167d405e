use std::sync::Arc;

use quiz_core::model::{Progress, QuestionId, QuestionSet};
use storage::repository::{AuthSession, ProgressRepository, StorageError};
use tracing::{debug, warn};

use crate::Clock;
use crate::error::ProgressError;

/// Whether the last write reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    /// The write failed; the in-session progress was left as it was.
    Unsaved { reason: String, transient: bool },
    /// The backend refused the write for this identity. Callers should stop
    /// after showing the result.
    Denied { reason: String },
}

impl SaveStatus {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveStatus::Saved)
    }

    /// Converts a refused write into the error that ends the session.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Unauthorized` for `SaveStatus::Denied`.
    pub fn check_denied(&self) -> Result<(), ProgressError> {
        match self {
            SaveStatus::Denied { reason } => Err(ProgressError::Unauthorized(reason.clone())),
            _ => Ok(()),
        }
    }
}

/// Result of grading one submitted choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub question_id: QuestionId,
    pub correct: bool,
    pub correct_index: usize,
    pub saved: SaveStatus,
}

/// Grades answers and keeps the caller's progress row in step with them.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, progress: Arc<dyn ProgressRepository>) -> Self {
        Self { clock, progress }
    }

    /// Fetch the caller's row, or an empty one if none exists yet.
    ///
    /// Nothing is written until the first attempt.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Unauthorized` if the backend refuses the read,
    /// `ProgressError::Storage` for other failures.
    pub async fn load(&self, session: &AuthSession) -> Result<Progress, ProgressError> {
        let owner = session.user_id();
        let progress = self
            .progress
            .fetch_progress(session, owner)
            .await?
            .unwrap_or_else(|| Progress::empty(owner, self.clock.now()));
        debug!(user_id = %owner, attempts = progress.attempts(), "loaded progress");
        Ok(progress)
    }

    /// Grades `choice` for `question_id` and persists the updated row.
    ///
    /// `current` is only replaced once the write succeeds. A failed or refused
    /// write is reported through `AttemptOutcome::saved` so the grade can
    /// still be shown.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownQuestion` or `ChoiceOutOfRange` for input
    /// that does not match the question set.
    pub async fn record_attempt(
        &self,
        session: &AuthSession,
        questions: &QuestionSet,
        current: &mut Progress,
        question_id: QuestionId,
        choice: usize,
    ) -> Result<AttemptOutcome, ProgressError> {
        let question = questions
            .get(question_id)
            .ok_or(ProgressError::UnknownQuestion(question_id))?;
        if choice >= question.choices().len() {
            return Err(ProgressError::ChoiceOutOfRange {
                question: question_id,
                choice,
            });
        }
        let correct = question.is_correct(choice);

        let mut next = current.clone();
        next.apply_attempt(question_id, correct, self.clock.now());
        let saved = self.save(session, current, next).await;

        debug!(%question_id, correct, saved = saved.is_saved(), "recorded attempt");
        Ok(AttemptOutcome {
            question_id,
            correct,
            correct_index: question.correct_index(),
            saved,
        })
    }

    /// Zero the counters and clear both id lists.
    pub async fn reset(&self, session: &AuthSession, current: &mut Progress) -> SaveStatus {
        let mut next = current.clone();
        next.reset(self.clock.now());
        self.save(session, current, next).await
    }

    async fn save(&self, session: &AuthSession, current: &mut Progress, next: Progress) -> SaveStatus {
        match self.progress.upsert_progress(session, &next).await {
            Ok(()) => {
                *current = next;
                SaveStatus::Saved
            }
            Err(StorageError::Unauthorized(reason)) => {
                warn!(user_id = %next.user_id(), reason = %reason, "progress write denied");
                SaveStatus::Denied { reason }
            }
            Err(err) => {
                warn!(user_id = %next.user_id(), error = %err, "progress not saved");
                SaveStatus::Unsaved {
                    reason: err.to_string(),
                    transient: err.is_transient(),
                }
            }
        }
    }
}
