//! Domain logic for the audit job orchestrator.
//!
//! - [`registry`] - the immutable catalog of worker scripts.
//! - [`roles`] / [`run_config`] - input role assignment and per-run config.
//! - [`scripting`] - interpreter discovery and worker process streaming.
//! - [`progress`] / [`run_state`] - output classification and run bookkeeping.

pub mod error;
pub mod progress;
pub mod registry;
pub mod roles;
pub mod run_config;
pub mod run_state;
pub mod scripting;
pub mod types;

pub use error::CoreError;
