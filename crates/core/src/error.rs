use thiserror::Error;

use crate::model::{AnswerParseError, QuestionError};

/// Errors raised while turning raw question data into domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Answer(#[from] AnswerParseError),
    #[error(transparent)]
    Question(#[from] QuestionError),
}
