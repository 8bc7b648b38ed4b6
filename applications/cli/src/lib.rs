//! Ayiah command-line front end
//!
//! Configuration loading and the error type shared by the `ayiah` binary.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{CliError, Result};
