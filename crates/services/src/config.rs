use std::env;
use std::path::PathBuf;
use std::time::Duration;

use storage::remote::RemoteConfig;
use tracing::debug;

use crate::error::ConfigError;

pub const DATABASE_URL_VAR: &str = "SUPABASE_URL";
pub const API_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const CSV_PATH_VAR: &str = "QUIZ_CSV_PATH";
pub const HTTP_TIMEOUT_VAR: &str = "QUIZ_HTTP_TIMEOUT_SECS";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Where accounts and progress rows live, chosen from the URL scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Local `SQLite` database, e.g. `sqlite://quiz.sqlite3`.
    Sqlite { url: String },
    /// Managed database with a Supabase-compatible API.
    Remote(RemoteConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub api_key: String,
    pub csv_path: Option<PathBuf>,
    pub http_timeout: Duration,
}

impl AppConfig {
    /// Read settings from the process environment, loading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if a required variable is unset or blank,
    /// `ConfigError::Invalid` for values that cannot be used.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => {
                return Err(ConfigError::Invalid {
                    key: ".env",
                    reason: err.to_string(),
                });
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = non_blank(DATABASE_URL_VAR)
            .ok_or(ConfigError::Missing(DATABASE_URL_VAR))?
            .trim()
            .to_string();
        let api_key = non_blank(API_KEY_VAR)
            .ok_or(ConfigError::Missing(API_KEY_VAR))?
            .trim()
            .to_string();
        let csv_path = non_blank(CSV_PATH_VAR).map(PathBuf::from);
        let http_timeout = match non_blank(HTTP_TIMEOUT_VAR) {
            None => DEFAULT_HTTP_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: HTTP_TIMEOUT_VAR,
                        reason: format!("expected a positive number of seconds, got {raw:?}"),
                    });
                }
            },
        };

        let config = Self {
            database_url,
            api_key,
            csv_path,
            http_timeout,
        };
        config.backend()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the URL scheme is neither `sqlite:` nor `http(s)://`.
    pub fn backend(&self) -> Result<Backend, ConfigError> {
        let url = self.database_url.as_str();
        if url.starts_with("sqlite:") {
            return Ok(Backend::Sqlite {
                url: url.to_string(),
            });
        }
        if url.starts_with("https://") || url.starts_with("http://") {
            return Ok(Backend::Remote(
                RemoteConfig::new(url, self.api_key.clone()).with_timeout(self.http_timeout),
            ));
        }
        Err(ConfigError::Invalid {
            key: DATABASE_URL_VAR,
            reason: format!("unsupported scheme in {url:?}"),
        })
    }
}
