use std::collections::HashMap;

use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::text::{first_number, normalize_text};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons an `answer` field cannot be turned into a choice index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerParseError {
    #[error("empty answer field")]
    Empty,

    #[error("cannot parse correct option from: {raw}")]
    NoDigits { raw: String },

    #[error("correct option must be >= 1, got 0")]
    ZeroOption,

    #[error("correct option {option} out of range for {choices} choices")]
    OutOfRange { option: u64, choices: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("no choices parsed")]
    NoChoices,

    #[error("correct index {index} out of range for {choices} choices")]
    CorrectIndexOutOfRange { index: usize, choices: usize },

    #[error("missing Question_int")]
    MissingId,

    #[error("invalid Question_int: {raw}")]
    InvalidId { raw: String },

    #[error("duplicate Question_int: {0}")]
    DuplicateId(QuestionId),
}

//
// ─── FIELD PARSERS ─────────────────────────────────────────────────────────────
//

/// Extracts the 0-based correct choice index from free answer text.
///
/// The first integer in the text is read as a 1-based option number, so
/// `"Correct Option: 2"` yields `1`.
///
/// # Errors
///
/// Returns `AnswerParseError` if the text is empty, holds no digit, names
/// option 0, or names an option past `choice_count`.
pub fn parse_correct_index(answer: &str, choice_count: usize) -> Result<usize, AnswerParseError> {
    let text = normalize_text(answer);
    let text = text.trim();
    if text.is_empty() {
        return Err(AnswerParseError::Empty);
    }
    let option = first_number(text).ok_or_else(|| AnswerParseError::NoDigits {
        raw: text.to_string(),
    })?;
    if option == 0 {
        return Err(AnswerParseError::ZeroOption);
    }
    let index = usize::try_from(option - 1).unwrap_or(usize::MAX);
    if index >= choice_count {
        return Err(AnswerParseError::OutOfRange {
            option,
            choices: choice_count,
        });
    }
    Ok(index)
}

/// Splits a pipe-delimited choice list.
///
/// Keeps inner spacing, strips an Excel text-marker apostrophe and leading
/// whitespace, and drops blank entries.
#[must_use]
pub fn parse_choices(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(|part| {
            let part = normalize_text(part);
            let part = part.strip_prefix('\'').unwrap_or(&part);
            part.trim_start().to_string()
        })
        .filter(|part| !part.trim().is_empty())
        .collect()
}

/// Reads the optional `calc` tag. Truthy values are `1`, `true`, `yes`, `y`, `t`.
#[must_use]
pub fn parse_calculation_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "t"
    )
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    choices: Vec<String>,
    correct_index: usize,
    explanation: String,
    is_calculation: bool,
}

impl Question {
    /// # Errors
    ///
    /// Returns `QuestionError` if there are no choices or the correct index
    /// does not point at one of them.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        choices: Vec<String>,
        correct_index: usize,
        explanation: impl Into<String>,
        is_calculation: bool,
    ) -> Result<Self, QuestionError> {
        if choices.is_empty() {
            return Err(QuestionError::NoChoices);
        }
        if correct_index >= choices.len() {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: correct_index,
                choices: choices.len(),
            });
        }
        Ok(Self {
            id,
            prompt: prompt.into(),
            choices,
            correct_index,
            explanation: explanation.into(),
            is_calculation,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn correct_choice(&self) -> &str {
        &self.choices[self.correct_index]
    }

    /// Explanatory markup from the `back` column; empty when absent.
    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn is_calculation(&self) -> bool {
        self.is_calculation
    }

    /// Grades a 0-based choice.
    #[must_use]
    pub fn is_correct(&self, choice_index: usize) -> bool {
        choice_index == self.correct_index
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// The immutable, ordered question bank for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionSet {
    questions: Vec<Question>,
    by_id: HashMap<QuestionId, usize>,
}

impl QuestionSet {
    /// # Errors
    ///
    /// Returns `QuestionError::DuplicateId` if two questions share an id.
    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionError> {
        let mut by_id = HashMap::with_capacity(questions.len());
        for (pos, q) in questions.iter().enumerate() {
            if by_id.insert(q.id(), pos).is_some() {
                return Err(QuestionError::DuplicateId(q.id()));
            }
        }
        Ok(Self { questions, by_id })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.by_id.get(&id).map(|&pos| &self.questions[pos])
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: u64, calc: bool) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            vec!["a".into(), "b".into()],
            0,
            "",
            calc,
        )
        .unwrap()
    }

    #[test]
    fn extracts_index_from_labelled_answer() {
        assert_eq!(parse_correct_index("Correct Option: 2", 4), Ok(1));
    }

    #[test]
    fn extracts_index_for_every_in_range_digit() {
        for option in 1..=9_usize {
            let answer = format!("answer is ({option}) see notes");
            assert_eq!(parse_correct_index(&answer, 9), Ok(option - 1));
        }
    }

    #[test]
    fn rejects_answer_without_digits() {
        assert!(matches!(
            parse_correct_index("Correct Option: four", 4),
            Err(AnswerParseError::NoDigits { .. })
        ));
        assert_eq!(parse_correct_index("   ", 4), Err(AnswerParseError::Empty));
    }

    #[test]
    fn rejects_zero_and_out_of_range_options() {
        assert_eq!(parse_correct_index("0", 4), Err(AnswerParseError::ZeroOption));
        assert_eq!(
            parse_correct_index("Option 5", 4),
            Err(AnswerParseError::OutOfRange {
                option: 5,
                choices: 4
            })
        );
    }

    #[test]
    fn choices_are_split_and_cleaned() {
        let choices = parse_choices("'3| 4 |\u{00a0}5||6");
        assert_eq!(choices, vec!["3", "4 ", "5", "6"]);
    }

    #[test]
    fn calculation_flag_truthy_values() {
        for raw in ["1", "TRUE", " yes ", "y", "t"] {
            assert!(parse_calculation_flag(raw), "{raw}");
        }
        for raw in ["", "0", "no", "false", "calc"] {
            assert!(!parse_calculation_flag(raw), "{raw}");
        }
    }

    #[test]
    fn question_rejects_bad_index() {
        let err = Question::new(QuestionId::new(1), "p", vec!["a".into()], 1, "", false)
            .unwrap_err();
        assert_eq!(
            err,
            QuestionError::CorrectIndexOutOfRange {
                index: 1,
                choices: 1
            }
        );
    }

    #[test]
    fn question_grades_choice() {
        let q = Question::new(
            QuestionId::new(1),
            "2+2?",
            vec!["3".into(), "4".into(), "5".into(), "6".into()],
            1,
            "",
            true,
        )
        .unwrap();
        assert!(q.is_correct(1));
        assert!(!q.is_correct(0));
        assert_eq!(q.correct_choice(), "4");
    }

    #[test]
    fn question_set_rejects_duplicate_ids() {
        let err = QuestionSet::new(vec![sample(1, false), sample(1, true)]).unwrap_err();
        assert_eq!(err, QuestionError::DuplicateId(QuestionId::new(1)));
    }

    #[test]
    fn question_set_lookup_by_id() {
        let set = QuestionSet::new(vec![sample(3, false), sample(9, true)]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.get(QuestionId::new(9)).unwrap().is_calculation());
        assert!(set.get(QuestionId::new(4)).is_none());
    }
}
