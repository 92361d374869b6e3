//! Common utilities shared across services.
//!
//! This crate provides:
//! - The error taxonomy of the data-access layer
//! - Configuration structures
//! - Tracing bootstrap

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::*;
pub use error::{AppError, AppResult, OptionExt};
