pub mod config;
pub mod error;
pub mod ingestion;
pub mod observability;
pub mod price_infra;
pub mod rate_limit;
pub mod streaming;
pub mod utils;

pub use error::{Error, Result};

// Config environment used when FEEDINFRA_ENV is unset
pub const DEFAULT_ENV: &str = "development";
