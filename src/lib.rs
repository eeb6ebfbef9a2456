//! nmdc_agent: Provenance-driven workflow job scheduler and runner.
//!
//! This library discovers eligible downstream workflow stages from the
//! provenance of completed records, materializes versioned job records,
//! and drives claimed jobs through submission, polling, and finalization
//! against a Cromwell-compatible execution engine.

// Core modules
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod records;
pub mod remote;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod store;

// Re-export commonly used error types
pub use error::{
    ApiError, ConfigError, EngineError, GraphError, LifecycleError, SchedulerError,
    SettingsError, StateError, StoreError,
};
