//! Job orchestrator service.
//!
//! Coordinates script lookup, admission, config materialization, worker
//! spawning, progress publication and result collection. Held in
//! [`AppState`](crate::state::AppState) as an `Arc<JobOrchestrator>`.

mod driver;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use auditflow_core::error::CoreError;
use auditflow_core::registry::{ScriptDefinition, ScriptRegistry};
use auditflow_core::roles::InputFile;
use auditflow_core::run_config::{ConfigMaterializer, MaterializedConfig};
use auditflow_core::scripting::executor::WorkerInvocation;
use auditflow_core::scripting::interpreter::InterpreterResolver;
use auditflow_core::scripting::subprocess::spawn_worker;
use auditflow_core::types::RunId;
use auditflow_events::{ProgressBus, ProgressEvent, ProgressReceiver, Subscription};
use auditflow_store::{OutputCollector, ResultArtifact, ResultsIndex};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;

use crate::config::OrchestratorConfig;

/// File extensions the input pickers accept.
pub const ACCEPTED_INPUTS: &[&str] = &[".xlsx", ".xls", ".csv", ".json"];

/// What the caller wants a script to run against.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub input_files: Vec<InputFile>,
    /// Merged verbatim into the run config.
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Runs worker scripts and keeps track of their results.
///
/// Manages the full lifecycle of a run:
/// 1. Resolve the script from the registry.
/// 2. Take an admission permit (or fail with `AtCapacity`).
/// 3. Resolve the interpreter.
/// 4. Write the run config.
/// 5. Spawn the worker and hand it to a driver task.
///
/// Steps 1-5 fail synchronously. Everything after the spawn is reported
/// through the progress bus only.
pub struct JobOrchestrator {
    registry: Arc<ScriptRegistry>,
    materializer: ConfigMaterializer,
    interpreter: InterpreterResolver,
    bus: Arc<ProgressBus>,
    index: ResultsIndex,
    collector: OutputCollector,
    admission: Arc<Semaphore>,
    max_concurrent_runs: usize,
}

impl JobOrchestrator {
    /// Build an orchestrator that probes for the configured Python.
    pub async fn open(
        config: &OrchestratorConfig,
        registry: ScriptRegistry,
    ) -> Result<Self, CoreError> {
        let interpreter = InterpreterResolver::new(config.python_path.clone());
        Self::with_interpreter(config, registry, interpreter).await
    }

    /// Build an orchestrator with an explicit interpreter resolver.
    pub async fn with_interpreter(
        config: &OrchestratorConfig,
        registry: ScriptRegistry,
        interpreter: InterpreterResolver,
    ) -> Result<Self, CoreError> {
        let index = ResultsIndex::open(config.results_dir()).await?;
        let materializer = ConfigMaterializer::new(config.runs_dir())
            .with_filename_heuristics(config.role_heuristics);

        tracing::info!(
            scripts = registry.len(),
            max_concurrent_runs = config.max_concurrent_runs,
            role_heuristics = config.role_heuristics,
            "Job orchestrator ready",
        );

        Ok(Self {
            registry: Arc::new(registry),
            materializer,
            interpreter,
            bus: Arc::new(ProgressBus::new()),
            collector: OutputCollector::new(index.clone()),
            index,
            admission: Arc::new(Semaphore::new(config.max_concurrent_runs)),
            max_concurrent_runs: config.max_concurrent_runs,
        })
    }

    /// Start a run of `script_key` and return its id.
    ///
    /// The returned id is valid for progress subscriptions right away. The
    /// run itself continues on a background task.
    pub async fn run(&self, script_key: &str, request: RunRequest) -> Result<RunId, CoreError> {
        let script = self.registry.resolve(script_key)?.clone();

        let permit = Arc::clone(&self.admission)
            .try_acquire_owned()
            .map_err(|_| CoreError::AtCapacity {
                limit: self.max_concurrent_runs,
            })?;

        let interpreter = self.interpreter.resolve().await?.to_string();

        let run_id = uuid::Uuid::new_v4();
        let materialized = self
            .materializer
            .materialize(run_id, &script, &request.input_files, &request.options)
            .await?;

        let invocation = build_invocation(interpreter, &script, &materialized, run_id, &request);
        let process = match spawn_worker(invocation).await {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(run_id = %run_id, script_key = %script.key, error = %e, "Worker spawn failed");
                discard_run_dir(&materialized.run_dir).await;
                return Err(CoreError::from(e));
            }
        };

        tracing::info!(
            run_id = %run_id,
            script_key = %script.key,
            pid = ?process.id(),
            "Run started",
        );

        self.bus.publish(
            ProgressEvent::running(run_id, 0).with_message(format!("Starting {}", script.label)),
        );

        let run = driver::ActiveRun {
            run_id,
            script,
            output_dir: materialized.output_dir,
            bus: Arc::clone(&self.bus),
            collector: self.collector.clone(),
            permit,
        };
        tokio::spawn(driver::drive(run, process));

        Ok(run_id)
    }

    /// Call `handler` for every progress event of `run_id` (or of all runs).
    pub fn on_progress<F>(&self, run_id: Option<RunId>, handler: F) -> Subscription
    where
        F: FnMut(ProgressEvent) + Send + 'static,
    {
        self.bus.subscribe(run_id, handler)
    }

    /// Receive progress events of `run_id` (or of all runs) on a channel.
    pub fn progress_channel(&self, run_id: Option<RunId>) -> ProgressReceiver {
        self.bus.subscribe_channel(run_id)
    }

    pub async fn list_results(&self) -> Result<Vec<ResultArtifact>, CoreError> {
        self.index.list().await
    }

    pub async fn get_result(&self, id: &str) -> Result<ResultArtifact, CoreError> {
        self.index.get(id).await
    }

    /// Path of the stored copy of result `id`.
    pub async fn locate_result(&self, id: &str) -> Result<PathBuf, CoreError> {
        self.index.locate(id).await
    }

    /// Copy result `id` to `destination` (a file path or an existing
    /// directory) and return the written path.
    pub async fn download_result(&self, id: &str, destination: &Path) -> Result<PathBuf, CoreError> {
        self.index.export(id, destination).await
    }

    pub fn accepted_inputs(&self) -> &'static [&'static str] {
        ACCEPTED_INPUTS
    }

    /// Runs currently holding an admission permit.
    pub fn active_runs(&self) -> usize {
        self.max_concurrent_runs - self.admission.available_permits()
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.max_concurrent_runs
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    /// Resolve (and cache) the worker interpreter.
    pub async fn interpreter(&self) -> Result<String, CoreError> {
        Ok(self.interpreter.resolve().await?.to_string())
    }
}

/// Remove the directory of a run that never started.
async fn discard_run_dir(run_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(run_dir).await {
        tracing::warn!(run_dir = %run_dir.display(), error = %e, "Cannot remove unused run directory");
    }
}

/// Assemble the worker command line, environment and stdin payload.
fn build_invocation(
    interpreter: String,
    script: &ScriptDefinition,
    materialized: &MaterializedConfig,
    run_id: RunId,
    request: &RunRequest,
) -> WorkerInvocation {
    let env_vars = vec![
        ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
        ("RUN_ID".to_string(), run_id.to_string()),
        (
            "OUTPUT_DIRECTORY".to_string(),
            materialized.output_dir.to_string_lossy().into_owned(),
        ),
    ];

    let stdin_payload = (!script.stdin_options.is_empty()).then(|| {
        let forwarded: Map<String, Value> = script
            .stdin_options
            .iter()
            .filter_map(|key| {
                request
                    .options
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect();
        Value::Object(forwarded)
    });

    WorkerInvocation {
        interpreter,
        entry_point: script.entry_point.clone(),
        args: vec![
            script.key.clone(),
            materialized.config_path.to_string_lossy().into_owned(),
        ],
        env_vars,
        working_directory: script.entry_point.parent().map(Path::to_path_buf),
        stdin_payload,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn materialized() -> MaterializedConfig {
        MaterializedConfig {
            run_dir: "/data/runs/r".into(),
            config_path: "/data/runs/r/config.json".into(),
            output_dir: "/data/runs/r/outputs".into(),
        }
    }

    #[test]
    fn invocation_passes_key_config_and_env() {
        let script = ScriptDefinition::new("exception_testing", "/opt/payroll/main.py", "Exception Testing");
        let run_id = uuid::Uuid::new_v4();
        let invocation = build_invocation(
            "python3".into(),
            &script,
            &materialized(),
            run_id,
            &RunRequest::default(),
        );

        assert_eq!(invocation.args, vec!["exception_testing", "/data/runs/r/config.json"]);
        assert_eq!(invocation.working_directory, Some(PathBuf::from("/opt/payroll")));
        assert!(invocation
            .env_vars
            .contains(&("RUN_ID".to_string(), run_id.to_string())));
        assert!(invocation
            .env_vars
            .contains(&("OUTPUT_DIRECTORY".to_string(), "/data/runs/r/outputs".to_string())));
        assert!(invocation.stdin_payload.is_none());
    }

    #[test]
    fn stdin_carries_only_declared_options() {
        let script = ScriptDefinition::new("execute_exception_sharepoint", "/s/x.py", "X")
            .with_stdin_options(&["pay_registrar", "expn_no"]);
        let request = RunRequest {
            input_files: vec![],
            options: json!({"expn_no": [1, 4], "unrelated": true})
                .as_object()
                .cloned()
                .expect("object"),
        };

        let invocation = build_invocation(
            "python3".into(),
            &script,
            &materialized(),
            uuid::Uuid::new_v4(),
            &request,
        );
        assert_eq!(invocation.stdin_payload, Some(json!({"expn_no": [1, 4]})));
    }

    #[test]
    fn run_request_accepts_camel_case() {
        let request: RunRequest = serde_json::from_value(json!({
            "inputFiles": [{"path": "/in/a.xlsx", "role": "pay_registrar"}],
            "options": {"expn_no": [1]}
        }))
        .expect("parse");
        assert_eq!(request.input_files.len(), 1);
        assert_eq!(request.options["expn_no"], json!([1]));
    }
}
