#![forbid(unsafe_code)]

pub mod codec;
pub mod credentials;
pub mod remote;
pub mod repository;
pub mod schema;
pub mod sqlite;

pub use repository::{
    AccountRepository, AuthSession, InMemoryRepository, ProgressRepository, SignUpOutcome,
    Storage, StorageError,
};
