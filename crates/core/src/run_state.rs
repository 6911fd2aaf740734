//! In-memory bookkeeping for one run while its worker is alive.

use serde::{Deserialize, Serialize};

use crate::progress::{self, Classification};
use crate::scripting::executor::{OutputLine, StreamKind};
use crate::types::RunId;

/// Maximum bytes kept per output stream (10 MiB). Later output is dropped.
pub const MAX_CAPTURE_BYTES: usize = 10 * 1024 * 1024;

/// Highest progress a run can report before its worker has exited.
pub const MAX_RUNNING_PERCENT: u8 = 99;

/// Progress carried by every terminal event.
pub const COMPLETE_PERCENT: u8 = 100;

/// Lifecycle status of a run as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Accumulated state of one run.
#[derive(Debug)]
pub struct RunState {
    run_id: RunId,
    script_key: String,
    status: RunStatus,
    last_progress: u8,
    last_error: Option<String>,
    stdout: Capture,
    stderr: Capture,
}

impl RunState {
    pub fn new(run_id: RunId, script_key: impl Into<String>) -> Self {
        Self {
            run_id,
            script_key: script_key.into(),
            status: RunStatus::Running,
            last_progress: 0,
            last_error: None,
            stdout: Capture::default(),
            stderr: Capture::default(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn script_key(&self) -> &str {
        &self.script_key
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.last_progress
    }

    /// Most recent error detail reported by the worker, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn stdout(&self) -> &str {
        &self.stdout.text
    }

    pub fn stderr(&self) -> &str {
        &self.stderr.text
    }

    /// Capture one line of output and fold its classification into the
    /// running progress.
    ///
    /// Progress only moves forward and stays below [`COMPLETE_PERCENT`]
    /// until [`finish`](Self::finish). Lines arriving after the run has
    /// finished are captured but change nothing else.
    pub fn record(&mut self, line: &OutputLine) -> Classification {
        match line.stream {
            StreamKind::Stdout => self.stdout.push_line(&line.text),
            StreamKind::Stderr => self.stderr.push_line(&line.text),
        }

        let classification = progress::classify_line(line);
        if self.status.is_terminal() {
            return classification;
        }

        if let Some(percent) = classification.percent {
            let clamped = percent.min(MAX_RUNNING_PERCENT);
            self.last_progress = self.last_progress.max(clamped);
        }
        if let Some(error) = &classification.error {
            self.last_error = Some(error.clone());
        }
        classification
    }

    /// Move to a terminal status and pin progress at 100.
    ///
    /// Returns `false` (and changes nothing) when the run already finished
    /// or `status` is not terminal.
    pub fn finish(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.last_progress = COMPLETE_PERCENT;
        true
    }
}

/// Line accumulator that keeps the head of a stream up to
/// [`MAX_CAPTURE_BYTES`].
#[derive(Debug, Default)]
struct Capture {
    text: String,
    truncated: bool,
}

impl Capture {
    fn push_line(&mut self, line: &str) {
        if self.truncated {
            return;
        }
        if self.text.len() + line.len() + 1 > MAX_CAPTURE_BYTES {
            self.truncated = true;
            tracing::debug!("Worker output capture limit reached, dropping further lines");
            return;
        }
        self.text.push_str(line);
        self.text.push('\n');
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
