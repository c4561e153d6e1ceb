//! Shared library for the anime catalog explorer.
//!
//! This crate provides the ambient pieces used by the catalog crate:
//! - Configuration management
//! - Durable key/value storage (SQLite-backed "local storage")
//! - Persisted models (filters, view mode, favorites)
//! - File path utilities
//! - Logging infrastructure

pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod paths;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use logging::LogConfig;
pub use models::*;
pub use paths::DataPaths;
pub use storage::{LocalStorage, MemoryStorage};

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
