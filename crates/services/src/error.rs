//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use quiz_core::model::{QuestionError, QuestionId};
use storage::remote::RemoteInitError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Errors emitted by the question loader.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("no question file found (tried {})", display_paths(.tried))]
    NotFound { tried: Vec<PathBuf> },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("no usable questions ({skipped} rows skipped)")]
    NoQuestions { skipped: usize },
    #[error(transparent)]
    Question(#[from] QuestionError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error("an account with this e-mail already exists")]
    AlreadyRegistered,
    #[error("{0}")]
    Rejected(String),
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for AuthError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::InvalidCredentials(_) => AuthError::InvalidCredentials,
            StorageError::Conflict(_) => AuthError::AlreadyRegistered,
            StorageError::Invalid(message) => AuthError::Rejected(message),
            other => AuthError::Storage(other),
        }
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    /// The backend refused access to the row. Never retried.
    #[error("progress access denied: {0}")]
    Unauthorized(String),
    #[error("no question is selected")]
    NoCurrentQuestion,
    #[error("question {0} is not part of the loaded set")]
    UnknownQuestion(QuestionId),
    #[error("choice {choice} is out of range for question {question}")]
    ChoiceOutOfRange { question: QuestionId, choice: usize },
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ProgressError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Unauthorized(message) => ProgressError::Unauthorized(message),
            other => ProgressError::Storage(other),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Remote(#[from] RemoteInitError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_auth_errors() {
        assert!(matches!(
            AuthError::from(StorageError::InvalidCredentials("bad".into())),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from(StorageError::Conflict("taken".into())),
            AuthError::AlreadyRegistered
        ));
        assert!(matches!(
            AuthError::from(StorageError::Connection("reset".into())),
            AuthError::Storage(_)
        ));
    }

    #[test]
    fn unauthorized_is_kept_apart_from_other_storage_failures() {
        assert!(matches!(
            ProgressError::from(StorageError::Unauthorized("rls".into())),
            ProgressError::Unauthorized(_)
        ));
        assert!(matches!(
            ProgressError::from(StorageError::NotFound),
            ProgressError::Storage(StorageError::NotFound)
        ));
    }

    #[test]
    fn missing_columns_lists_names() {
        let err = LoadError::MissingColumns(vec!["answer".into(), "Question_int".into()]);
        assert_eq!(err.to_string(), "CSV is missing required columns: answer, Question_int");
    }
}
