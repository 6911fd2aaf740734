//! Audit job orchestrator API server library.
//!
//! Exposes the orchestrator facade, configuration, error handling, routes and
//! the progress WebSocket so integration tests and the binary entrypoint can
//! both access them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
