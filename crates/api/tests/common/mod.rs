#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use auditflow_api::config::{OrchestratorConfig, ServerConfig};
use auditflow_api::orchestrator::JobOrchestrator;
use auditflow_api::router::build_app_router;
use auditflow_api::state::AppState;
use auditflow_core::registry::{ScriptDefinition, ScriptRegistry};
use auditflow_core::scripting::interpreter::InterpreterResolver;
use auditflow_core::types::RunId;
use auditflow_events::{ProgressEvent, ProgressReceiver};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Scratch directory holding worker scripts and the data directory.
pub struct TestEnv {
    pub dir: tempfile::TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.data_dir().join("runs")
    }

    pub fn config(&self) -> OrchestratorConfig {
        OrchestratorConfig::with_data_dir(self.data_dir())
    }

    /// Write a bash worker script and return its path.
    pub fn worker(&self, name: &str, body: &str) -> PathBuf {
        let workers = self.dir.path().join("workers");
        std::fs::create_dir_all(&workers).expect("mkdir workers");
        let path = workers.join(format!("{name}.sh"));
        std::fs::write(&path, body).expect("write worker");
        path
    }

    /// Orchestrator over `scripts` that runs workers with bash.
    pub async fn orchestrator(&self, scripts: Vec<ScriptDefinition>) -> Arc<JobOrchestrator> {
        self.orchestrator_with(self.config(), scripts, vec!["bash".to_string()])
            .await
    }

    pub async fn orchestrator_with(
        &self,
        config: OrchestratorConfig,
        scripts: Vec<ScriptDefinition>,
        interpreters: Vec<String>,
    ) -> Arc<JobOrchestrator> {
        let registry = ScriptRegistry::new(scripts).expect("registry");
        let resolver = InterpreterResolver::with_candidates(interpreters);
        Arc::new(
            JobOrchestrator::with_interpreter(&config, registry, resolver)
                .await
                .expect("orchestrator"),
        )
    }

    /// Number of run directories created so far.
    pub fn run_dir_count(&self) -> usize {
        dir_entry_count(&self.runs_dir())
    }
}

pub fn dir_entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// Build the full application router around `orchestrator`.
pub fn build_test_app(orchestrator: Arc<JobOrchestrator>) -> Router {
    let config = test_config();
    let state = AppState { orchestrator };
    build_app_router(state, &config)
}

/// Collect the events of `run_id` up to and including its terminal event.
pub async fn wait_for_terminal(rx: &mut ProgressReceiver, run_id: RunId) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(20), rx.recv())
            .await
            .expect("timed out waiting for progress")
            .expect("progress bus closed");
        if event.run_id != run_id {
            continue;
        }
        let done = event.is_terminal();
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Events of `run_id` still queued on `rx`.
pub fn drain_for(rx: &mut ProgressReceiver, run_id: RunId) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.try_recv() {
        if event.run_id == run_id {
            events.push(event);
        }
    }
    events
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    app.oneshot(request).await.expect("response")
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    app.oneshot(request).await.expect("response")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
