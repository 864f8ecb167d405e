#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth_service;
pub mod config;
pub mod error;
pub mod progress_service;
pub mod question_loader;
pub mod quiz_session;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use auth_service::AuthService;
pub use config::{AppConfig, Backend};
pub use error::{AppServicesError, AuthError, ConfigError, LoadError, ProgressError};
pub use progress_service::{AttemptOutcome, ProgressService, SaveStatus};
pub use question_loader::{LoadReport, RowProblem, load_questions, parse_questions};
pub use quiz_session::{QuizSession, Stats};
