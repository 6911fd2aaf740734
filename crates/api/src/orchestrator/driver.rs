//! Per-run driver task: streams worker output onto the progress bus and
//! finishes the run once the worker exits.

use std::path::PathBuf;
use std::sync::Arc;

use auditflow_core::error::CoreError;
use auditflow_core::registry::ScriptDefinition;
use auditflow_core::run_state::{RunState, RunStatus};
use auditflow_core::scripting::executor::StreamKind;
use auditflow_core::scripting::subprocess::WorkerProcess;
use auditflow_core::types::RunId;
use auditflow_events::{ProgressBus, ProgressEvent};
use auditflow_store::{OutputCollector, ResultArtifact};
use tokio::sync::OwnedSemaphorePermit;

/// Everything a driver task needs besides the process itself.
pub(super) struct ActiveRun {
    pub run_id: RunId,
    pub script: ScriptDefinition,
    pub output_dir: PathBuf,
    pub bus: Arc<ProgressBus>,
    pub collector: OutputCollector,
    /// Released after the terminal event has been published.
    pub permit: OwnedSemaphorePermit,
}

pub(super) async fn drive(run: ActiveRun, mut process: WorkerProcess) {
    let ActiveRun {
        run_id,
        script,
        output_dir,
        bus,
        collector,
        permit,
    } = run;
    let mut state = RunState::new(run_id, &script.key);

    while let Some(line) = process.next_line().await {
        let classification = state.record(&line);

        let mut event = ProgressEvent::running(run_id, state.progress());
        if let Some(message) = classification.message {
            event = event.with_message(message);
        }
        if let Some(error) = classification.error {
            event = event.with_error(error);
        }
        event = match line.stream {
            StreamKind::Stdout => event.with_stdout(line.text),
            StreamKind::Stderr => event.with_stderr(line.text),
        };
        bus.publish(event);
    }

    let outcome = match process.wait().await {
        Ok(exit) if exit.success() => collector.collect(run_id, &script, &output_dir).await,
        Ok(exit) => Err(CoreError::NonZeroExit {
            code: exit.code(),
            stderr: state.stderr().to_string(),
        }),
        Err(e) => Err(CoreError::from(e)),
    };

    bus.publish(terminal_event(&mut state, &script, outcome));
    drop(permit);
}

/// Finish `state` and build the single terminal event for the run.
fn terminal_event(
    state: &mut RunState,
    script: &ScriptDefinition,
    outcome: Result<Vec<ResultArtifact>, CoreError>,
) -> ProgressEvent {
    let run_id = state.run_id();
    match outcome {
        Ok(artifacts) => {
            state.finish(RunStatus::Success);
            tracing::info!(
                run_id = %run_id,
                script_key = %state.script_key(),
                artifacts = artifacts.len(),
                "Run completed",
            );
            ProgressEvent::new(run_id, state.progress(), RunStatus::Success)
                .with_message(format!(
                    "{} completed ({} result file(s))",
                    script.label,
                    artifacts.len()
                ))
                .with_stdout(state.stdout())
                .with_stderr(state.stderr())
        }
        Err(err) => {
            state.finish(RunStatus::Error);
            tracing::warn!(
                run_id = %run_id,
                script_key = %state.script_key(),
                error = %err,
                "Run failed",
            );
            let detail = failure_detail(state, &err);
            ProgressEvent::new(run_id, state.progress(), RunStatus::Error)
                .with_message(err.to_string())
                .with_error(detail)
                .with_stdout(state.stdout())
                .with_stderr(state.stderr())
        }
    }
}

/// The most specific description of a failure available: the worker's
/// last reported error, then its last stderr line, then the error itself.
fn failure_detail(state: &RunState, err: &CoreError) -> String {
    if let CoreError::NonZeroExit { .. } = err {
        if let Some(reported) = state.last_error() {
            return reported.to_string();
        }
        if let Some(last) = state.stderr().lines().rev().find(|l| !l.trim().is_empty()) {
            return last.trim().to_string();
        }
    }
    err.to_string()
}
