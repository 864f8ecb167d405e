use std::sync::Arc;

use chrono::Duration;
use storage::repository::{AccountRepository, AuthSession, SignUpOutcome};
use tracing::{debug, info};

use crate::Clock;
use crate::error::AuthError;

/// Sessions this close to expiry are renewed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Sign-in, sign-up and session upkeep against the configured account backend.
#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    accounts: Arc<dyn AccountRepository>,
}

impl AuthService {
    #[must_use]
    pub fn new(clock: Clock, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { clock, accounts }
    }

    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a blank or wrong e-mail/password
    /// pair, `AuthError::Storage` if the backend cannot be reached.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let session = self.accounts.sign_in(email, password).await?;
        info!(user_id = %session.user_id(), "signed in");
        Ok(session)
    }

    /// Create an account. The remote backend may ask for e-mail confirmation
    /// before the first sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AlreadyRegistered` if the e-mail is taken and
    /// `AuthError::Rejected` for input the backend refuses.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let outcome = self.accounts.sign_up(email, password).await?;
        if let SignUpOutcome::ConfirmationRequired { .. } = outcome {
            info!("sign-up needs e-mail confirmation");
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend rejects the sign-out.
    pub async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        self.accounts.sign_out(session).await?;
        info!(user_id = %session.user_id(), "signed out");
        Ok(())
    }

    /// Returns `session` unchanged unless it expires within
    /// [`REFRESH_MARGIN_SECS`], in which case a renewed session is returned.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the refresh token is no longer accepted.
    pub async fn ensure_fresh(&self, session: AuthSession) -> Result<AuthSession, AuthError> {
        let now = self.clock.now();
        if !session.expires_within(now, Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Ok(session);
        }
        debug!(user_id = %session.user_id(), expires_at = ?session.expires_at, "refreshing session");
        Ok(self.accounts.refresh(&session).await?)
    }
}
