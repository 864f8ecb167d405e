use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{Identity, Progress, UserId};
use quiz_core::policy::{self, PolicyViolation, ProgressAccess};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::credentials::{check_password_strength, hash_password, normalize_email, verify_password};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The caller does not own the row it tried to touch.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("backend rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl StorageError {
    /// Authorization failures are never transient; everything that might
    /// succeed on a later attempt is.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Connection(_) => true,
            StorageError::Rejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<PolicyViolation> for StorageError {
    fn from(value: PolicyViolation) -> Self {
        StorageError::Unauthorized(value.to_string())
    }
}

/// An authenticated session issued by an `AccountRepository`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub identity: Identity,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` for sessions that do not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    /// True when the session expires within `margin` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at.is_some_and(|at| now + margin >= at)
    }

    /// Authorizes `access` for this session's identity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unauthorized` if the ownership rules reject it.
    pub fn authorize(&self, access: ProgressAccess) -> Result<(), StorageError> {
        policy::authorize(self.user_id(), access).map_err(StorageError::from)
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    /// The provider created the account but wants the e-mail confirmed first.
    ConfirmationRequired { user_id: Option<UserId> },
}

/// Account contract of the identity provider.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the e-mail is taken, `Invalid` for
    /// rejected input, or other storage errors.
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, StorageError>;

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidCredentials` on a bad e-mail/password pair.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, StorageError>;

    /// Renew a session before it expires.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the refresh token is rejected or the backend is unreachable.
    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, StorageError>;

    /// Invalidate a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the request.
    async fn sign_out(&self, session: &AuthSession) -> Result<(), StorageError>;
}

/// Access to progress rows. Every call is made on behalf of `session` and
/// must be authorized against the row owner before any data is touched.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Read the progress row of `owner`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unauthorized` if `owner` is not the caller.
    async fn fetch_progress(
        &self,
        session: &AuthSession,
        owner: UserId,
    ) -> Result<Option<Progress>, StorageError>;

    /// Insert or replace the progress row keyed by `progress.user_id()`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unauthorized` if the row belongs, or would
    /// belong, to someone other than the caller.
    async fn upsert_progress(
        &self,
        session: &AuthSession,
        progress: &Progress,
    ) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
struct AccountRecord {
    user_id: UserId,
    password_hash: String,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    accounts: Arc<Mutex<HashMap<String, AccountRecord>>>,
    progress: Arc<Mutex<HashMap<UserId, Progress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn issue_session(user_id: UserId, email: &str) -> AuthSession {
        AuthSession {
            identity: Identity::new(user_id, email),
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_at: None,
        }
    }
}

#[async_trait]
impl AccountRepository for InMemoryRepository {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, StorageError> {
        let email = normalize_email(email)?;
        check_password_strength(password)?;
        let mut guard = self
            .accounts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&email) {
            return Err(StorageError::Conflict(format!("{email} is already registered")));
        }
        let user_id = UserId::random();
        guard.insert(
            email.clone(),
            AccountRecord {
                user_id,
                password_hash: hash_password(password)?,
            },
        );
        Ok(SignUpOutcome::SignedIn(Self::issue_session(user_id, &email)))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, StorageError> {
        let email = normalize_email(email)
            .map_err(|_| StorageError::InvalidCredentials("invalid login credentials".into()))?;
        let guard = self
            .accounts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        match guard.get(&email) {
            Some(record) if verify_password(password, &record.password_hash) => {
                Ok(Self::issue_session(record.user_id, &email))
            }
            _ => Err(StorageError::InvalidCredentials(
                "invalid login credentials".into(),
            )),
        }
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, StorageError> {
        Ok(AuthSession {
            access_token: Uuid::new_v4().to_string(),
            ..session.clone()
        })
    }

    async fn sign_out(&self, _session: &AuthSession) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn fetch_progress(
        &self,
        session: &AuthSession,
        owner: UserId,
    ) -> Result<Option<Progress>, StorageError> {
        session.authorize(ProgressAccess::Select { row_owner: owner })?;
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&owner).cloned())
    }

    async fn upsert_progress(
        &self,
        session: &AuthSession,
        progress: &Progress,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let new_owner = progress.user_id();
        let access = match guard.get(&new_owner) {
            Some(existing) => ProgressAccess::Update {
                existing_owner: existing.user_id(),
                new_owner,
            },
            None => ProgressAccess::Insert { new_owner },
        };
        session.authorize(access)?;
        guard.insert(new_owner, progress.clone());
        Ok(())
    }
}

/// Aggregates account and progress repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub accounts: Arc<dyn AccountRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let accounts: Arc<dyn AccountRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { accounts, progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionId;
    use quiz_core::time::fixed_now;

    async fn signed_in(repo: &InMemoryRepository, email: &str) -> AuthSession {
        match repo.sign_up(email, "secret-pw").await.unwrap() {
            SignUpOutcome::SignedIn(session) => session,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn owner_round_trips_progress() {
        let repo = InMemoryRepository::new();
        let session = signed_in(&repo, "ann@example.com").await;

        let mut progress = Progress::empty(session.user_id(), fixed_now());
        progress.apply_attempt(QuestionId::new(1), false, fixed_now());
        repo.upsert_progress(&session, &progress).await.unwrap();

        let fetched = repo
            .fetch_progress(&session, session.user_id())
            .await
            .unwrap()
            .expect("row");
        assert_eq!(fetched, progress);
    }

    #[tokio::test]
    async fn other_identity_cannot_read_or_write() {
        let repo = InMemoryRepository::new();
        let ann = signed_in(&repo, "ann@example.com").await;
        let bob = signed_in(&repo, "bob@example.com").await;

        let progress = Progress::empty(ann.user_id(), fixed_now());
        repo.upsert_progress(&ann, &progress).await.unwrap();

        let read = repo.fetch_progress(&bob, ann.user_id()).await;
        assert!(matches!(read, Err(StorageError::Unauthorized(_))));

        let write = repo.upsert_progress(&bob, &progress).await;
        assert!(matches!(write, Err(StorageError::Unauthorized(_))));

        let insert_as = repo
            .upsert_progress(&bob, &Progress::empty(UserId::random(), fixed_now()))
            .await;
        assert!(matches!(insert_as, Err(StorageError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn sign_in_rejects_wrong_password() {
        let repo = InMemoryRepository::new();
        let _ = signed_in(&repo, "ann@example.com").await;

        let ok = repo.sign_in("ANN@example.com", "secret-pw").await;
        assert!(ok.is_ok());

        let bad = repo.sign_in("ann@example.com", "nope-nope").await;
        assert!(matches!(bad, Err(StorageError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn duplicate_sign_up_conflicts() {
        let repo = InMemoryRepository::new();
        let _ = signed_in(&repo, "ann@example.com").await;
        let again = repo.sign_up("ann@example.com", "secret-pw").await;
        assert!(matches!(again, Err(StorageError::Conflict(_))));
    }

    #[test]
    fn only_connection_and_server_errors_are_transient() {
        assert!(StorageError::Connection("reset".into()).is_transient());
        assert!(
            StorageError::Rejected {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!StorageError::Unauthorized("no".into()).is_transient());
        assert!(!StorageError::NotFound.is_transient());
    }

    #[test]
    fn session_expiry_margin() {
        let now = fixed_now();
        let session = AuthSession {
            identity: Identity::anonymous(UserId::random()),
            access_token: "t".into(),
            refresh_token: None,
            expires_at: Some(now + Duration::seconds(30)),
        };
        assert!(session.expires_within(now, Duration::seconds(60)));
        assert!(!session.expires_within(now, Duration::seconds(10)));
    }
}
