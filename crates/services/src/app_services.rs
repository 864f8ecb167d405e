use std::env;
use std::sync::Arc;

use quiz_core::model::QuestionSet;
use quiz_core::selection::Selection;
use storage::repository::{AuthSession, Storage};
use storage::sqlite::SqliteRepository;
use tracing::info;

use crate::Clock;
use crate::auth_service::AuthService;
use crate::config::{AppConfig, Backend};
use crate::error::{AppServicesError, AuthError, LoadError};
use crate::progress_service::ProgressService;
use crate::question_loader::{LoadReport, load_questions, resolve_csv_path};
use crate::quiz_session::QuizSession;

/// Assembles app-facing services for the configured backend.
#[derive(Clone)]
pub struct AppServices {
    config: AppConfig,
    auth: Arc<AuthService>,
    progress: Arc<ProgressService>,
    local: Option<SqliteRepository>,
}

impl AppServices {
    /// Connect to the backend named by `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the URL is unusable or the backend cannot
    /// be initialized.
    pub async fn bootstrap(config: AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let (storage, local) = match config.backend()? {
            Backend::Sqlite { url } => {
                let repo = SqliteRepository::connect(&url).await?;
                repo.migrate().await?;
                (Storage::from_sqlite(repo.clone()), Some(repo))
            }
            Backend::Remote(remote) => {
                info!(url = %remote.url, "using remote backend");
                (Storage::remote(&remote)?, None)
            }
        };
        Ok(Self::with_storage(config, clock, storage, local))
    }

    /// Build services over an existing `Storage`, e.g. the in-memory one.
    #[must_use]
    pub fn with_storage(
        config: AppConfig,
        clock: Clock,
        storage: Storage,
        local: Option<SqliteRepository>,
    ) -> Self {
        let Storage { accounts, progress } = storage;
        Self {
            config,
            auth: Arc::new(AuthService::new(clock, accounts)),
            progress: Arc::new(ProgressService::new(clock, progress)),
            local,
        }
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    /// Read the configured question file, or the first default file in the
    /// working directory.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if no file is found or it yields no questions.
    pub fn load_question_bank(&self) -> Result<LoadReport, LoadError> {
        let dir = env::current_dir().map_err(|source| LoadError::Io {
            path: ".".into(),
            source,
        })?;
        let path = resolve_csv_path(self.config.csv_path.as_deref(), &dir)?;
        load_questions(&path)
    }

    /// Load the caller's progress and open a practice run over `questions`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Progress` if the progress row cannot be read.
    pub async fn start_quiz(
        &self,
        session: &AuthSession,
        questions: Arc<QuestionSet>,
        selection: Selection,
    ) -> Result<QuizSession, AppServicesError> {
        let progress = self.progress.load(session).await?;
        Ok(QuizSession::new(questions, progress, selection))
    }

    /// Remove the caller's account together with its progress row.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unsupported` on the remote backend, where accounts
    /// are managed by the provider.
    pub async fn delete_account(&self, session: &AuthSession) -> Result<(), AuthError> {
        let repo = self
            .local
            .as_ref()
            .ok_or(AuthError::Unsupported("account deletion"))?;
        repo.delete_account(session).await?;
        Ok(())
    }
}
