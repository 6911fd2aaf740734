//! Shared types for launching worker processes.
//!
//! Defines [`WorkerInvocation`] (what to spawn), [`OutputLine`] (one line of
//! captured output), [`WorkerExit`] (how the process ended), and
//! [`ScriptError`] for failures below the orchestrator.

use std::fmt;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::CoreError;

/// Everything needed to spawn one worker process.
#[derive(Debug, Clone)]
pub struct WorkerInvocation {
    /// Interpreter executable (resolved by [`super::interpreter`]).
    pub interpreter: String,
    /// Worker entry point, passed as the first argument.
    pub entry_point: PathBuf,
    /// Remaining positional arguments (script key, config path).
    pub args: Vec<String>,
    /// Additional environment variables for the child process.
    pub env_vars: Vec<(String, String)>,
    /// Working directory for the child process (current dir if `None`).
    pub working_directory: Option<PathBuf>,
    /// JSON payload written to stdin. Stdin is closed immediately if `None`.
    pub stdin_payload: Option<Value>,
}

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// A single line of worker output, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: StreamKind,
    pub text: String,
}

impl OutputLine {
    pub fn new(stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
        }
    }
}

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Exited on its own with this code.
    Code(i32),
    /// Killed by a signal (no exit code available).
    Signal,
}

impl WorkerExit {
    pub fn success(self) -> bool {
        matches!(self, Self::Code(0))
    }

    pub fn code(self) -> Option<i32> {
        match self {
            Self::Code(code) => Some(code),
            Self::Signal => None,
        }
    }
}

/// Errors raised while probing for or spawning a worker process.
#[derive(Debug)]
pub enum ScriptError {
    /// None of the interpreter candidates could be executed.
    InterpreterNotFound(Vec<String>),
    /// The worker entry point does not exist.
    EntryPointMissing(PathBuf),
    /// The OS refused to start the process.
    Spawn(std::io::Error),
    /// Waiting on the running process failed.
    Wait(std::io::Error),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterpreterNotFound(tried) => {
                write!(f, "No interpreter found (tried: {})", tried.join(", "))
            }
            Self::EntryPointMissing(path) => {
                write!(f, "Worker entry point not found: {}", path.display())
            }
            Self::Spawn(err) => write!(f, "Spawn failed: {err}"),
            Self::Wait(err) => write!(f, "Wait failed: {err}"),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(err) | Self::Wait(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScriptError> for CoreError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::InterpreterNotFound(tried) => CoreError::InterpreterNotFound { tried },
            other => CoreError::ProcessSpawn(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_entry_point_missing() {
        let err = ScriptError::EntryPointMissing(PathBuf::from("/opt/payroll/main.py"));
        assert_eq!(
            err.to_string(),
            "Worker entry point not found: /opt/payroll/main.py"
        );
    }

    #[test]
    fn spawn_error_has_source() {
        let err = ScriptError::Spawn(std::io::Error::other("boom"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("Spawn failed:"));
    }

    #[test]
    fn interpreter_not_found_maps_to_core_variant() {
        let core: CoreError = ScriptError::InterpreterNotFound(vec!["python3".into()]).into();
        assert!(matches!(core, CoreError::InterpreterNotFound { tried } if tried == ["python3"]));
    }

    #[test]
    fn spawn_failures_map_to_process_spawn() {
        let core: CoreError = ScriptError::Spawn(std::io::Error::other("denied")).into();
        assert!(matches!(core, CoreError::ProcessSpawn(_)));
    }

    #[test]
    fn exit_classification() {
        assert!(WorkerExit::Code(0).success());
        assert!(!WorkerExit::Code(1).success());
        assert!(!WorkerExit::Signal.success());
        assert_eq!(WorkerExit::Signal.code(), None);
    }
}
