#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod policy;
pub mod selection;
pub mod text;
pub mod time;

pub use error::Error;
pub use time::Clock;
