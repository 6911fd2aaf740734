//! Worker interpreter discovery.
//!
//! Probes a list of candidate executables with `--version` and remembers
//! the first one that answers. The configured interpreter (if any) is tried
//! before the usual Python names.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::OnceCell;

use super::executor::ScriptError;

/// Interpreter names tried after the configured one, in order.
pub const DEFAULT_CANDIDATES: &[&str] = &["python3", "python", "py", "python3.exe", "python.exe"];

/// How long a single `--version` probe may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Finds and caches the interpreter used to run workers.
#[derive(Debug)]
pub struct InterpreterResolver {
    candidates: Vec<String>,
    resolved: OnceCell<String>,
}

impl InterpreterResolver {
    /// Resolver trying `preferred` first (when set), then [`DEFAULT_CANDIDATES`].
    pub fn new(preferred: Option<String>) -> Self {
        let mut candidates: Vec<String> = preferred.into_iter().filter(|p| !p.is_empty()).collect();
        for name in DEFAULT_CANDIDATES {
            if !candidates.iter().any(|c| c == name) {
                candidates.push((*name).to_string());
            }
        }
        Self::with_candidates(candidates)
    }

    /// Resolver trying exactly `candidates`, in order.
    pub fn with_candidates(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            resolved: OnceCell::new(),
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Return the first working candidate. A success is cached for the
    /// lifetime of the resolver; failures are retried on the next call.
    pub async fn resolve(&self) -> Result<&str, ScriptError> {
        self.resolved
            .get_or_try_init(|| async {
                for candidate in &self.candidates {
                    if probe(candidate).await {
                        tracing::info!(interpreter = %candidate, "Worker interpreter found");
                        return Ok(candidate.clone());
                    }
                    tracing::debug!(candidate = %candidate, "Interpreter candidate not available");
                }
                Err(ScriptError::InterpreterNotFound(self.candidates.clone()))
            })
            .await
            .map(String::as_str)
    }
}

/// `true` when `<candidate> --version` exits 0 within [`PROBE_TIMEOUT`].
async fn probe(candidate: &str) -> bool {
    let mut cmd = Command::new(candidate);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, cmd.status()).await,
        Ok(Ok(status)) if status.success()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_interpreter_goes_first_without_duplicates() {
        let resolver = InterpreterResolver::new(Some("python3".to_string()));
        assert_eq!(resolver.candidates()[0], "python3");
        assert_eq!(
            resolver.candidates().iter().filter(|c| *c == "python3").count(),
            1
        );

        let resolver = InterpreterResolver::new(Some("/opt/py/bin/python".to_string()));
        assert_eq!(resolver.candidates()[0], "/opt/py/bin/python");
        assert_eq!(resolver.candidates().len(), DEFAULT_CANDIDATES.len() + 1);
    }

    #[test]
    fn empty_preference_is_ignored() {
        let resolver = InterpreterResolver::new(Some(String::new()));
        assert_eq!(resolver.candidates().len(), DEFAULT_CANDIDATES.len());
    }

    #[tokio::test]
    async fn skips_missing_candidates() {
        let resolver = InterpreterResolver::with_candidates(vec![
            "/nonexistent/interpreter".to_string(),
            "bash".to_string(),
        ]);
        assert_eq!(resolver.resolve().await.expect("resolve"), "bash");
    }

    #[tokio::test]
    async fn reports_every_candidate_when_none_work() {
        let resolver = InterpreterResolver::with_candidates(vec![
            "/nonexistent/a".to_string(),
            "/nonexistent/b".to_string(),
        ]);
        match resolver.resolve().await {
            Err(ScriptError::InterpreterNotFound(tried)) => {
                assert_eq!(tried, vec!["/nonexistent/a", "/nonexistent/b"]);
            }
            other => panic!("expected InterpreterNotFound, got {other:?}"),
        }
    }
}
