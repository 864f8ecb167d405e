use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{Identity, UserId};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::repository::{AccountRepository, AuthSession, SignUpOutcome, StorageError};

use super::{RemoteBackend, error_from_response, network_error};

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl UserPayload {
    fn identity(self) -> Result<Identity, StorageError> {
        let user_id = self
            .id
            .parse::<UserId>()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Identity {
            user_id,
            email: self.email,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserPayload,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Result<AuthSession, StorageError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => DateTime::<Utc>::from_timestamp(at, 0),
            (None, Some(secs)) => Some(now + Duration::seconds(secs)),
            (None, None) => None,
        };
        Ok(AuthSession {
            identity: self.user.identity()?,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

/// Sign-up answers with a session when auto-confirm is on, otherwise with the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserPayload),
}

impl RemoteBackend {
    async fn token_request(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<AuthSession, StorageError> {
        let url = self.url(&format!("/auth/v1/token?grant_type={grant_type}"));
        debug!(url = %url, "requesting auth token");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(match error_from_response(response).await {
                err @ StorageError::InvalidCredentials(_) => err,
                err => StorageError::InvalidCredentials(err.to_string()),
            });
        }
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(format!("failed to parse token response: {e}")))?;
        token.into_session(Utc::now())
    }
}

#[async_trait]
impl AccountRepository for RemoteBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, StorageError> {
        let url = self.url("/auth/v1/signup");
        debug!(url = %url, "signing up");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(format!("failed to parse sign-up response: {e}")))?;
        match body {
            SignUpResponse::Session(token) => {
                let session = token.into_session(Utc::now())?;
                info!(user_id = %session.user_id(), "account created and signed in");
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpResponse::User(user) => {
                let user_id = user.identity().ok().map(|identity| identity.user_id);
                info!(user_id = ?user_id, "account created, confirmation pending");
                Ok(SignUpOutcome::ConfirmationRequired { user_id })
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, StorageError> {
        self.token_request(
            "password",
            json!({ "email": email.trim(), "password": password }),
        )
        .await
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, StorageError> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Err(StorageError::InvalidCredentials(
                "session has no refresh token".into(),
            ));
        };
        self.token_request("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.url("/auth/v1/logout"))
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| network_error(&e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    const USER: &str = "6f1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d";

    #[test]
    fn token_response_prefers_absolute_expiry() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 1_700_000_100,
            "user": { "id": USER, "email": "ann@example.com" }
        }))
        .unwrap();
        let session = token.into_session(fixed_now()).unwrap();
        assert_eq!(session.expires_at, DateTime::<Utc>::from_timestamp(1_700_000_100, 0));
        assert_eq!(session.identity.email.as_deref(), Some("ann@example.com"));
    }

    #[test]
    fn token_response_falls_back_to_relative_expiry() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "expires_in": 60,
            "user": { "id": USER }
        }))
        .unwrap();
        let session = token.into_session(fixed_now()).unwrap();
        assert_eq!(session.expires_at, Some(fixed_now() + Duration::seconds(60)));
        assert_eq!(session.refresh_token, None);
    }

    #[test]
    fn sign_up_response_distinguishes_pending_confirmation() {
        let pending: SignUpResponse =
            serde_json::from_value(json!({ "id": USER, "email": "ann@example.com" })).unwrap();
        assert!(matches!(pending, SignUpResponse::User(_)));
    }
}
