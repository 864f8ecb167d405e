use async_trait::async_trait;
use chrono::Utc;
use quiz_core::model::{Identity, UserId};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::credentials::{check_password_strength, hash_password, normalize_email, verify_password};
use crate::repository::{AccountRepository, AuthSession, SignUpOutcome, StorageError};

use super::SqliteRepository;
use super::mapping::user_id_from_str;

/// Local sessions never expire; the token only identifies the login.
fn local_session(user_id: UserId, email: &str) -> AuthSession {
    AuthSession {
        identity: Identity::new(user_id, email),
        access_token: Uuid::new_v4().to_string(),
        refresh_token: None,
        expires_at: None,
    }
}

fn invalid_login() -> StorageError {
    StorageError::InvalidCredentials("invalid login credentials".into())
}

#[async_trait]
impl AccountRepository for SqliteRepository {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, StorageError> {
        let email = normalize_email(email)?;
        check_password_strength(password)?;
        let user_id = UserId::random();

        sqlx::query(
            r"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(user_id.to_string())
        .bind(&email)
        .bind(hash_password(password)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| match err.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                StorageError::Conflict(format!("{email} is already registered"))
            }
            _ => StorageError::Connection(err.to_string()),
        })?;

        info!(%user_id, "created local account");
        Ok(SignUpOutcome::SignedIn(local_session(user_id, &email)))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, StorageError> {
        let email = normalize_email(email).map_err(|_| invalid_login())?;

        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = ?1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        let Some(row) = row else {
            debug!("sign-in for unknown e-mail");
            return Err(invalid_login());
        };

        let stored: String = row
            .try_get("password_hash")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        if !verify_password(password, &stored) {
            return Err(invalid_login());
        }

        let user_id = user_id_from_str(
            &row.try_get::<String, _>("id")
                .map_err(|err| StorageError::Serialization(err.to_string()))?,
        )?;
        Ok(local_session(user_id, &email))
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, StorageError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
            .bind(session.user_id().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        if row.is_none() {
            return Err(invalid_login());
        }
        Ok(AuthSession {
            access_token: Uuid::new_v4().to_string(),
            ..session.clone()
        })
    }

    async fn sign_out(&self, _session: &AuthSession) -> Result<(), StorageError> {
        Ok(())
    }
}
