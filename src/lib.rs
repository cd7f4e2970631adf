// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod report;
pub mod strategy;

// Re-export commonly used types
pub use config::Settings;
pub use error::{AssetError, NotifyError, SourceError, StateError};
pub use execution::{AssetOutcome, AssetResult, SignalCycle};
pub use models::*;

// Error handling
pub type Result<T> = anyhow::Result<T>;
