//! Progress delivery for audit runs.
//!
//! - [`ProgressBus`] - in-process publish/subscribe hub with per-subscriber
//!   queues and optional per-run filtering.
//! - [`ProgressEvent`] - the update published for every classified line and
//!   once more when a run finishes.

pub mod bus;

pub use bus::{ProgressBus, ProgressEvent, ProgressReceiver, Subscription};
