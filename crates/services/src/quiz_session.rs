use std::fmt;
use std::sync::Arc;

use quiz_core::model::{Progress, Question, QuestionId, QuestionSet};
use quiz_core::selection::{Jump, Selection, Worklist, clamp_index};
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::AuthSession;
use tracing::debug;

use crate::error::ProgressError;
use crate::progress_service::{AttemptOutcome, ProgressService, SaveStatus};

/// One user's practice run over a shared question bank.
///
/// The worklist is built when the selection changes and stays fixed while
/// the user answers, so `Wrong only` does not shrink under the cursor.
pub struct QuizSession {
    questions: Arc<QuestionSet>,
    progress: Progress,
    selection: Selection,
    worklist: Worklist,
    cursor: usize,
    always_show: bool,
    rng: StdRng,
}

impl QuizSession {
    #[must_use]
    pub fn new(questions: Arc<QuestionSet>, progress: Progress, selection: Selection) -> Self {
        Self::with_rng(questions, progress, selection, StdRng::from_os_rng())
    }

    /// Like [`QuizSession::new`] with a caller-provided random source.
    #[must_use]
    pub fn with_rng(
        questions: Arc<QuestionSet>,
        progress: Progress,
        selection: Selection,
        rng: StdRng,
    ) -> Self {
        let mut session = Self {
            questions,
            progress,
            selection,
            worklist: Worklist::default(),
            cursor: 0,
            always_show: false,
            rng,
        };
        session.rebuild();
        session
    }

    #[must_use]
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    #[must_use]
    pub fn selection(&self) -> Selection {
        self.selection
    }

    #[must_use]
    pub fn worklist(&self) -> &Worklist {
        &self.worklist
    }

    /// Whether the answer is shown with each question before it is submitted.
    #[must_use]
    pub fn always_show(&self) -> bool {
        self.always_show
    }

    pub fn set_always_show(&mut self, on: bool) {
        self.always_show = on;
    }

    /// Switch mode or shuffle and start over at the first question.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.worklist = Worklist::build(&self.questions, &self.progress, &self.selection, &mut self.rng);
        self.cursor = 0;
        debug!(
            mode = self.selection.mode.label(),
            shuffle = self.selection.shuffle,
            size = self.worklist.len(),
            "built worklist"
        );
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn current_id(&self) -> Option<QuestionId> {
        self.worklist.get(self.cursor)
    }

    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.current_id().and_then(|id| self.questions.get(id))
    }

    /// Returns `false` when already at the last question.
    pub fn next(&mut self) -> bool {
        self.move_to(self.cursor.saturating_add(1))
    }

    /// Returns `false` when already at the first question.
    pub fn previous(&mut self) -> bool {
        self.move_to(self.cursor.saturating_sub(1))
    }

    fn move_to(&mut self, index: usize) -> bool {
        let index = clamp_index(index, self.worklist.len());
        let moved = index != self.cursor;
        self.cursor = index;
        moved
    }

    /// Go to a question by id (`47` or `Q47`), or to the nearest id in the worklist.
    pub fn jump(&mut self, query: &str) -> Option<Jump> {
        let jump = self.worklist.jump_to(query)?;
        self.cursor = jump.index;
        Some(jump)
    }

    /// Grade `choice` for the current question and save the result.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if there is no current question or the choice
    /// is out of range.
    pub async fn answer(
        &mut self,
        service: &ProgressService,
        session: &AuthSession,
        choice: usize,
    ) -> Result<AttemptOutcome, ProgressError> {
        let question_id = self
            .current_id()
            .ok_or(ProgressError::NoCurrentQuestion)?;
        service
            .record_attempt(session, &self.questions, &mut self.progress, question_id, choice)
            .await
    }

    /// Clear the user's progress and rebuild the worklist from it.
    pub async fn reset_progress(&mut self, service: &ProgressService, session: &AuthSession) -> SaveStatus {
        let status = service.reset(session, &mut self.progress).await;
        if status.is_saved() {
            self.rebuild();
        }
        status
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        Stats {
            position: if self.worklist.is_empty() { 0 } else { self.cursor + 1 },
            total: self.worklist.len(),
            mode: self.selection.mode.label(),
            attempts: self.progress.attempts(),
            correct: self.progress.correct(),
            accuracy: self.progress.accuracy(),
        }
    }
}

/// Snapshot for the status line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// 1-based; `0` for an empty worklist.
    pub position: usize,
    pub total: usize,
    pub mode: &'static str,
    pub attempts: u32,
    pub correct: u32,
    pub accuracy: Option<f64>,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} · {} · attempts {} · correct {} · accuracy ",
            self.position, self.total, self.mode, self.attempts, self.correct
        )?;
        match self.accuracy {
            Some(ratio) => write!(f, "{:.1}%", ratio * 100.0),
            None => f.write_str("—"),
        }
    }
}
