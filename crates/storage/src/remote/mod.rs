//! Client for a managed Postgres backend exposing a Supabase-compatible API:
//! GoTrue-style auth under `/auth/v1` and PostgREST tables under `/rest/v1`.
//!
//! Row-level security is enforced by the database; requests are still
//! authorized locally first so a policy violation never leaves the process.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;

use crate::repository::{AccountRepository, ProgressRepository, Storage, StorageError};

mod auth;
mod progress;

const USER_AGENT_VALUE: &str = concat!("quiz-progress/", env!("CARGO_PKG_VERSION"));

/// Connection settings for the managed backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteInitError {
    #[error("api key is not a valid header value")]
    InvalidApiKey,
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP backend implementing both repository contracts.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RemoteBackend {
    /// # Errors
    ///
    /// Returns `RemoteInitError` if the api key cannot be sent as a header or
    /// the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteInitError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        default_headers.insert(
            "apikey",
            HeaderValue::from_str(&config.api_key).map_err(|_| RemoteInitError::InvalidApiKey)?,
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Storage {
    /// Build a `Storage` talking to the managed backend.
    ///
    /// # Errors
    ///
    /// Returns `RemoteInitError` if the HTTP client cannot be created.
    pub fn remote(config: &RemoteConfig) -> Result<Self, RemoteInitError> {
        let backend = RemoteBackend::new(config)?;
        let accounts: Arc<dyn AccountRepository> = Arc::new(backend.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(backend);
        Ok(Self { accounts, progress })
    }
}

/// Error body shapes used by the auth and REST services.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self, fallback: &str) -> String {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| fallback.to_string())
    }
}

fn network_error(err: &reqwest::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

/// Maps a non-success response to a `StorageError`.
async fn error_from_response(response: reqwest::Response) -> StorageError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .unwrap_or_default()
        .into_message(if text.is_empty() {
            status.canonical_reason().unwrap_or("request failed")
        } else {
            &text
        });
    status_error(status, message)
}

fn status_error(status: StatusCode, message: String) -> StorageError {
    match status {
        // 401 is a missing or expired token; 403 is a row-level security refusal.
        StatusCode::UNAUTHORIZED => StorageError::InvalidCredentials(message),
        StatusCode::FORBIDDEN => StorageError::Unauthorized(message),
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::CONFLICT => StorageError::Conflict(message),
        StatusCode::UNPROCESSABLE_ENTITY => StorageError::Invalid(message),
        other => StorageError::Rejected {
            status: other.as_u16(),
            message,
        },
    }
}
