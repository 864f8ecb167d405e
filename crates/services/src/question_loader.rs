//! Reads the question bank from a CSV export.
//!
//! Bad rows are skipped and reported instead of failing the whole load, so a
//! single malformed line never takes the quiz down or gets graded wrongly.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use quiz_core::Error as RowError;
use quiz_core::model::{
    Question, QuestionError, QuestionId, QuestionSet, parse_calculation_flag, parse_choices,
    parse_correct_index,
};
use quiz_core::text::normalize_text;
use tracing::{debug, info, warn};

use crate::error::LoadError;

/// Files tried, in order, when no explicit path is configured.
pub const DEFAULT_CSV_FILES: [&str; 2] = ["OneThousand_MCQ.csv", "sample_questions.csv"];

const REQUIRED_COLUMNS: [&str; 4] = ["question", "choices", "answer", "Question_int"];
const ID_COLUMNS: [&str; 3] = ["Question_int", "id", "qid"];
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    /// Bytes were not valid UTF-8 and were read as ISO-8859-1.
    Latin1,
}

/// A skipped CSV row. `row_number` is the spreadsheet line (header = 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowProblem {
    pub row_number: u64,
    pub error: RowError,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub questions: QuestionSet,
    pub problems: Vec<RowProblem>,
    pub encoding: SourceEncoding,
}

/// Picks the CSV to read: `explicit` if given, otherwise the first default
/// file that exists in `dir`.
///
/// # Errors
///
/// Returns `LoadError::NotFound` listing every path that was tried.
pub fn resolve_csv_path(explicit: Option<&Path>, dir: &Path) -> Result<PathBuf, LoadError> {
    let candidates: Vec<PathBuf> = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => DEFAULT_CSV_FILES.iter().map(|name| dir.join(name)).collect(),
    };
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or(LoadError::NotFound { tried: candidates })
}

/// # Errors
///
/// Returns `LoadError` if the file cannot be read or parsed, lacks a required
/// column, or yields no usable question.
pub fn load_questions(path: &Path) -> Result<LoadReport, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let report = parse_questions(&bytes)?;
    info!(
        path = %path.display(),
        questions = report.questions.len(),
        skipped = report.problems.len(),
        "loaded question bank"
    );
    Ok(report)
}

/// Parses CSV bytes into a question set.
///
/// # Errors
///
/// See [`load_questions`].
pub fn parse_questions(bytes: &[u8]) -> Result<LoadReport, LoadError> {
    let (text, encoding) = decode(bytes);

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = Columns::new(reader.headers()?)?;

    let mut questions = Vec::new();
    let mut problems = Vec::new();
    let mut ids = HashSet::new();

    for (offset, record) in reader.records().enumerate() {
        let record = record?;
        let row_number = offset as u64 + 2;
        match headers.question(&record) {
            Ok(question) if !ids.insert(question.id()) => {
                problems.push(RowProblem {
                    row_number,
                    error: QuestionError::DuplicateId(question.id()).into(),
                });
            }
            Ok(question) => questions.push(question),
            Err(error) => problems.push(RowProblem { row_number, error }),
        }
    }

    for problem in &problems {
        debug!(row = problem.row_number, error = %problem.error, "skipped question row");
    }
    if questions.is_empty() {
        return Err(LoadError::NoQuestions {
            skipped: problems.len(),
        });
    }

    Ok(LoadReport {
        questions: QuestionSet::new(questions)?,
        problems,
        encoding,
    })
}

fn decode(bytes: &[u8]) -> (String, SourceEncoding) {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), SourceEncoding::Utf8),
        Err(err) => {
            warn!(offset = err.valid_up_to(), "question file is not UTF-8, reading as Latin-1");
            (bytes.iter().map(|&b| char::from(b)).collect(), SourceEncoding::Latin1)
        }
    }
}

/// Column positions resolved from the header row.
struct Columns {
    question: usize,
    choices: usize,
    answer: usize,
    back: Option<usize>,
    calc: Option<usize>,
    ids: Vec<usize>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Result<Self, LoadError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| (*name).to_string())
            .collect();
        let (Some(question), Some(choices), Some(answer), true) = (
            find("question"),
            find("choices"),
            find("answer"),
            missing.is_empty(),
        ) else {
            return Err(LoadError::MissingColumns(missing));
        };

        Ok(Self {
            question,
            choices,
            answer,
            back: find("back"),
            calc: find("calc"),
            ids: ID_COLUMNS.iter().filter_map(|name| find(name)).collect(),
        })
    }

    fn question(&self, record: &StringRecord) -> Result<Question, RowError> {
        let field = |index: usize| record.get(index).unwrap_or("");

        let choices = parse_choices(field(self.choices));
        if choices.is_empty() {
            return Err(QuestionError::NoChoices.into());
        }
        let correct_index = parse_correct_index(field(self.answer), choices.len())?;
        let id = self.id(record)?;
        let prompt = normalize_text(field(self.question));
        let explanation = self.back.map(|i| normalize_text(field(i))).unwrap_or_default();
        let is_calculation = self.calc.is_some_and(|i| parse_calculation_flag(field(i)));

        Ok(Question::new(
            id,
            prompt.trim(),
            choices,
            correct_index,
            explanation.trim(),
            is_calculation,
        )?)
    }

    /// First non-blank cell among `Question_int`, `id`, `qid`.
    fn id(&self, record: &StringRecord) -> Result<QuestionId, QuestionError> {
        let raw = self
            .ids
            .iter()
            .filter_map(|&i| record.get(i))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .ok_or(QuestionError::MissingId)?;
        raw.parse().map_err(|_| QuestionError::InvalidId {
            raw: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::AnswerParseError;

    const HEADER: &str = "question,choices,back,answer,Question_int,calc\n";

    fn parse(body: &str) -> LoadReport {
        parse_questions(format!("{HEADER}{body}").as_bytes()).unwrap()
    }

    #[test]
    fn reads_the_two_plus_two_row() {
        let report = parse("2+2?,3|4|5|6,Basic sum,Correct Option: 2,1,\n");
        assert!(report.problems.is_empty());
        let q = report.questions.get(QuestionId::new(1)).unwrap();
        assert_eq!(q.prompt(), "2+2?");
        assert_eq!(q.choices(), &["3", "4", "5", "6"]);
        assert_eq!(q.correct_index(), 1);
        assert_eq!(q.correct_choice(), "4");
        assert_eq!(q.explanation(), "Basic sum");
        assert!(!q.is_calculation());
    }

    #[test]
    fn bad_rows_are_reported_with_spreadsheet_numbers() {
        let report = parse(
            "ok,a|b,,1,1,yes\n\
             no choices,,,1,2,\n\
             bad answer,a|b,,none,3,\n\
             too high,a|b,,Option 3,4,\n\
             no id,a|b,,1,,\n\
             dup,a|b,,2,1,\n",
        );
        assert_eq!(report.questions.len(), 1);
        assert!(report.questions.get(QuestionId::new(1)).unwrap().is_calculation());

        let rows: Vec<u64> = report.problems.iter().map(|p| p.row_number).collect();
        assert_eq!(rows, vec![3, 4, 5, 6, 7]);
        assert_eq!(report.problems[0].error, RowError::from(QuestionError::NoChoices));
        assert!(matches!(
            report.problems[1].error,
            RowError::Answer(AnswerParseError::NoDigits { .. })
        ));
        assert!(matches!(
            report.problems[2].error,
            RowError::Answer(AnswerParseError::OutOfRange { option: 3, choices: 2 })
        ));
        assert_eq!(report.problems[3].error, RowError::from(QuestionError::MissingId));
        assert_eq!(
            report.problems[4].error,
            RowError::from(QuestionError::DuplicateId(QuestionId::new(1)))
        );
    }

    #[test]
    fn falls_back_to_id_columns() {
        let csv = "question,choices,answer,Question_int,id\nq,a|b,1,,42\n";
        let report = parse_questions(csv.as_bytes()).unwrap();
        assert!(report.questions.contains(QuestionId::new(42)));
    }

    #[test]
    fn accepts_bom_and_latin1() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"question,choices,answer,Question_int\nq,a|b,2,7\n");
        let report = parse_questions(&bytes).unwrap();
        assert_eq!(report.encoding, SourceEncoding::Utf8);
        assert!(report.questions.contains(QuestionId::new(7)));

        let latin1 = b"question,choices,answer,Question_int\ncaf\xe9?,oui|non,1,8\n";
        let report = parse_questions(latin1).unwrap();
        assert_eq!(report.encoding, SourceEncoding::Latin1);
        assert_eq!(
            report.questions.get(QuestionId::new(8)).unwrap().prompt(),
            "café?"
        );
    }

    #[test]
    fn missing_columns_are_named() {
        let err = parse_questions(b"question,choices\nq,a|b\n").unwrap_err();
        match err {
            LoadError::MissingColumns(cols) => assert_eq!(cols, vec!["answer", "Question_int"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn a_bank_without_valid_rows_is_an_error() {
        let err = parse_questions(format!("{HEADER}q,,,1,1,\n").as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::NoQuestions { skipped: 1 }));
    }

    #[test]
    fn resolves_default_file_names_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let missing = resolve_csv_path(None, dir.path()).unwrap_err();
        assert!(matches!(missing, LoadError::NotFound { ref tried } if tried.len() == 2));

        fs::write(dir.path().join("sample_questions.csv"), HEADER).unwrap();
        assert_eq!(
            resolve_csv_path(None, dir.path()).unwrap(),
            dir.path().join("sample_questions.csv")
        );

        fs::write(dir.path().join("OneThousand_MCQ.csv"), HEADER).unwrap();
        assert_eq!(
            resolve_csv_path(None, dir.path()).unwrap(),
            dir.path().join("OneThousand_MCQ.csv")
        );
    }
}
