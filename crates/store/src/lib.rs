//! Result storage for audit runs.
//!
//! [`OutputCollector`] copies a finished run's files into the results
//! directory; [`ResultsIndex`] is the append-only record of those copies and
//! the only source of truth for which results exist.

pub mod artifact;
pub mod collector;
pub mod index;

pub use artifact::ResultArtifact;
pub use collector::OutputCollector;
pub use index::ResultsIndex;
