/// Errors surfaced by the orchestrator and its components.
///
/// Everything up to and including [`CoreError::ProcessSpawn`] is detected
/// while a run is being started and is returned to the caller directly.
/// [`CoreError::NonZeroExit`] and [`CoreError::IndexWrite`] happen after the
/// caller already holds a run id and only reach it through the terminal
/// progress event.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown script: {0}")]
    UnknownScript(String),

    #[error("No worker interpreter found (tried: {})", tried.join(", "))]
    InterpreterNotFound { tried: Vec<String> },

    #[error("Config write failed: {0}")]
    ConfigWrite(String),

    #[error("Failed to spawn worker: {0}")]
    ProcessSpawn(String),

    #[error("{}", describe_exit(*code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Results index write failed: {0}")]
    IndexWrite(String),

    #[error("Result not found: {0}")]
    NotFound(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Run capacity reached ({limit} runs in flight)")]
    AtCapacity { limit: usize },

    #[error("Invalid script registry: {0}")]
    InvalidRegistry(String),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("Script exited with code {code}"),
        None => "Script terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_script() {
        let err = CoreError::UnknownScript("nope".into());
        assert_eq!(err.to_string(), "Unknown script: nope");
    }

    #[test]
    fn display_interpreter_not_found_lists_candidates() {
        let err = CoreError::InterpreterNotFound {
            tried: vec!["python3".into(), "python".into()],
        };
        assert_eq!(
            err.to_string(),
            "No worker interpreter found (tried: python3, python)"
        );
    }

    #[test]
    fn display_non_zero_exit() {
        let err = CoreError::NonZeroExit {
            code: Some(1),
            stderr: "Traceback".into(),
        };
        assert_eq!(err.to_string(), "Script exited with code 1");

        let err = CoreError::NonZeroExit {
            code: None,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "Script terminated by signal");
    }
}
