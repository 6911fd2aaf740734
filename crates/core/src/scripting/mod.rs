//! Worker process plumbing.
//!
//! Interpreter discovery, process spawning and incremental output capture.
//! Nothing here knows about runs, configs or results; the orchestrator in
//! the API crate drives these pieces.

pub mod executor;
pub mod interpreter;
pub mod subprocess;
