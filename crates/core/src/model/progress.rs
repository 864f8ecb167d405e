use chrono::{DateTime, Utc};

use crate::model::ids::{QuestionId, UserId};

/// Cumulative quiz performance of one user. One row per user in storage.
///
/// `seen_ids` and `wrong_ids` keep first-insertion order and never hold
/// duplicates. `updated_at` is always set by the caller's clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    user_id: UserId,
    attempts: u32,
    correct: u32,
    wrong_ids: Vec<QuestionId>,
    seen_ids: Vec<QuestionId>,
    updated_at: DateTime<Utc>,
}

impl Progress {
    /// A fresh row with the column defaults.
    #[must_use]
    pub fn empty(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            attempts: 0,
            correct: 0,
            wrong_ids: Vec::new(),
            seen_ids: Vec::new(),
            updated_at: now,
        }
    }

    /// Rehydrate a row read from storage. Duplicate ids are dropped, keeping
    /// the first occurrence.
    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        attempts: u32,
        correct: u32,
        wrong_ids: Vec<QuestionId>,
        seen_ids: Vec<QuestionId>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            attempts,
            correct,
            wrong_ids: dedup_in_order(wrong_ids),
            seen_ids: dedup_in_order(seen_ids),
            updated_at,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn wrong_ids(&self) -> &[QuestionId] {
        &self.wrong_ids
    }

    #[must_use]
    pub fn seen_ids(&self) -> &[QuestionId] {
        &self.seen_ids
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Fraction of correct attempts, `None` before the first attempt.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        if self.attempts == 0 {
            None
        } else {
            Some(f64::from(self.correct) / f64::from(self.attempts))
        }
    }

    /// Applies one graded attempt.
    ///
    /// Every call counts, even for the same question. A correct answer takes
    /// the question off the wrong list.
    pub fn apply_attempt(&mut self, question_id: QuestionId, correct: bool, now: DateTime<Utc>) {
        self.attempts = self.attempts.saturating_add(1);
        if correct {
            self.correct = self.correct.saturating_add(1);
            self.wrong_ids.retain(|id| *id != question_id);
        } else if !self.wrong_ids.contains(&question_id) {
            self.wrong_ids.push(question_id);
        }
        if !self.seen_ids.contains(&question_id) {
            self.seen_ids.push(question_id);
        }
        self.updated_at = now;
    }

    /// Clears counters and id lists, keeping the owner.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::empty(self.user_id, now);
    }
}

fn dedup_in_order(ids: Vec<QuestionId>) -> Vec<QuestionId> {
    let mut out: Vec<QuestionId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
