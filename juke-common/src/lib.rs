//! # Juke Common Library
//!
//! Shared code for Juke services:
//! - Process-wide configuration loading and validation
//! - Common error types

pub mod config;
pub mod error;

pub use config::Settings;
pub use error::{Error, Result};
