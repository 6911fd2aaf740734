//! WebSocket surface: a push stream of progress events.

mod progress;

pub use progress::{progress_handler, ProgressQuery};
