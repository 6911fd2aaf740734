//! Run configuration materialization.
//!
//! Every run gets exactly one `config.json` under its own run directory,
//! written before the worker is spawned and never touched afterwards.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::registry::ScriptDefinition;
use crate::roles::{self, InputFile, InputRole};
use crate::types::RunId;

/// Config key reserved for the run's private output directory.
pub const OUTPUT_DIRECTORY_KEY: &str = "output_directory";

/// File name of the materialized config inside a run directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Sub-directory of a run directory the worker writes its outputs to.
pub const OUTPUTS_DIR_NAME: &str = "outputs";

/// Where a role assignment came from. Logged so heuristic guesses are
/// distinguishable from caller intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    Explicit,
    FilenameHeuristic,
    Positional,
}

/// Paths of one materialized run.
#[derive(Debug, Clone)]
pub struct MaterializedConfig {
    pub run_dir: PathBuf,
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
}

/// Writes per-run config documents under a common runs directory.
#[derive(Debug, Clone)]
pub struct ConfigMaterializer {
    runs_dir: PathBuf,
    filename_heuristics: bool,
}

impl ConfigMaterializer {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            filename_heuristics: true,
        }
    }

    /// Enable or disable the filename-substring fallback.
    pub fn with_filename_heuristics(mut self, enabled: bool) -> Self {
        self.filename_heuristics = enabled;
        self
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    /// Assign a role to each input: explicit tag, then (optionally) filename
    /// heuristics, then the script's positional roles.
    pub fn assign_roles(
        &self,
        script: &ScriptDefinition,
        inputs: &[InputFile],
    ) -> Vec<Option<(InputRole, RoleSource)>> {
        inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                if let Some(role) = input.role {
                    return Some((role, RoleSource::Explicit));
                }
                if self.filename_heuristics {
                    if let Some(role) = roles::guess_from_filename(&input.path) {
                        return Some((role, RoleSource::FilenameHeuristic));
                    }
                }
                script
                    .positional_roles
                    .get(index)
                    .map(|role| (*role, RoleSource::Positional))
            })
            .collect()
    }

    /// Build the config document for a run without touching the disk.
    pub fn build_document(
        &self,
        script: &ScriptDefinition,
        inputs: &[InputFile],
        options: &Map<String, Value>,
        output_dir: &Path,
    ) -> Result<Map<String, Value>, CoreError> {
        if options.contains_key(OUTPUT_DIRECTORY_KEY) {
            return Err(CoreError::ConfigWrite(format!(
                "option '{OUTPUT_DIRECTORY_KEY}' conflicts with the reserved config key"
            )));
        }

        let mut document = Map::new();
        document.insert(
            OUTPUT_DIRECTORY_KEY.to_string(),
            Value::String(output_dir.to_string_lossy().into_owned()),
        );
        for (key, value) in options {
            document.insert(key.clone(), value.clone());
        }

        for (input, assignment) in inputs.iter().zip(self.assign_roles(script, inputs)) {
            let Some((role, source)) = assignment else {
                tracing::warn!(
                    script_key = %script.key,
                    path = %input.path.display(),
                    "Input file has no role and is left out of the run config",
                );
                continue;
            };

            let key = role.config_key();
            if source == RoleSource::FilenameHeuristic {
                tracing::debug!(
                    script_key = %script.key,
                    path = %input.path.display(),
                    role = key,
                    "Role guessed from filename",
                );
            }
            if options.contains_key(key) {
                tracing::warn!(
                    script_key = %script.key,
                    key,
                    "Input role overrides caller option of the same name",
                );
            }
            document.insert(
                key.to_string(),
                Value::String(input.path.to_string_lossy().into_owned()),
            );
        }

        Ok(document)
    }

    /// Create the run directory layout and write `config.json`.
    ///
    /// Nothing is created when the options are rejected.
    pub async fn materialize(
        &self,
        run_id: RunId,
        script: &ScriptDefinition,
        inputs: &[InputFile],
        options: &Map<String, Value>,
    ) -> Result<MaterializedConfig, CoreError> {
        let run_dir = self.runs_dir.join(run_id.to_string());
        let output_dir = run_dir.join(OUTPUTS_DIR_NAME);
        let config_path = run_dir.join(CONFIG_FILE_NAME);

        let document = self.build_document(script, inputs, options, &output_dir)?;

        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            CoreError::ConfigWrite(format!("cannot create {}: {e}", output_dir.display()))
        })?;

        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| CoreError::ConfigWrite(format!("cannot serialize config: {e}")))?;
        tokio::fs::write(&config_path, bytes).await.map_err(|e| {
            CoreError::ConfigWrite(format!("cannot write {}: {e}", config_path.display()))
        })?;

        tracing::debug!(
            run_id = %run_id,
            config_path = %config_path.display(),
            "Run config written",
        );

        Ok(MaterializedConfig {
            run_dir,
            config_path,
            output_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn exception_testing() -> ScriptDefinition {
        ScriptDefinition::new("exception_testing", "/w/main.py", "Exception Testing")
            .with_outputs(["Exception Testing.xlsx"])
            .with_positional_roles(&[InputRole::PayRegistrar, InputRole::CtcFile])
    }

    fn options(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn explicit_tag_beats_filename() {
        let materializer = ConfigMaterializer::new("/runs");
        let inputs = vec![InputFile::tagged("/in/ctc.xlsx", InputRole::PayRegistrar)];
        let roles = materializer.assign_roles(&exception_testing(), &inputs);
        assert_eq!(roles, vec![Some((InputRole::PayRegistrar, RoleSource::Explicit))]);
    }

    #[test]
    fn falls_back_to_position_when_name_is_opaque() {
        let materializer = ConfigMaterializer::new("/runs");
        let inputs = vec![
            InputFile::untagged("/in/book1.xlsx"),
            InputFile::untagged("/in/book2.xlsx"),
            InputFile::untagged("/in/book3.xlsx"),
        ];
        let roles = materializer.assign_roles(&exception_testing(), &inputs);
        assert_eq!(
            roles,
            vec![
                Some((InputRole::PayRegistrar, RoleSource::Positional)),
                Some((InputRole::CtcFile, RoleSource::Positional)),
                None,
            ]
        );
    }

    #[test]
    fn heuristics_can_be_disabled() {
        let materializer = ConfigMaterializer::new("/runs").with_filename_heuristics(false);
        let inputs = vec![InputFile::untagged("/in/CTC Report.xlsx")];
        let roles = materializer.assign_roles(&exception_testing(), &inputs);
        assert_eq!(
            roles,
            vec![Some((InputRole::PayRegistrar, RoleSource::Positional))]
        );
    }

    #[test]
    fn document_merges_options_and_roles() {
        let materializer = ConfigMaterializer::new("/runs");
        let inputs = vec![InputFile::untagged("/in/Pay Registrar.xlsx")];
        let doc = materializer
            .build_document(
                &exception_testing(),
                &inputs,
                &options(json!({"expn_no": [1, 2, 3], "pay_registrar_sheet": "Consol AIC"})),
                Path::new("/runs/x/outputs"),
            )
            .expect("document");

        assert_eq!(doc[OUTPUT_DIRECTORY_KEY], "/runs/x/outputs");
        assert_eq!(doc["expn_no"], json!([1, 2, 3]));
        assert_eq!(doc["pay_registrar_sheet"], "Consol AIC");
        assert_eq!(doc["pay_registrar"], "/in/Pay Registrar.xlsx");
    }

    #[test]
    fn reserved_key_in_options_is_rejected() {
        let materializer = ConfigMaterializer::new("/runs");
        let result = materializer.build_document(
            &exception_testing(),
            &[],
            &options(json!({"output_directory": "/tmp/elsewhere"})),
            Path::new("/runs/x/outputs"),
        );
        assert_matches!(result, Err(CoreError::ConfigWrite(msg)) if msg.contains("output_directory"));
    }

    #[tokio::test]
    async fn materialize_writes_config_under_run_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let materializer = ConfigMaterializer::new(dir.path());
        let run_id = uuid::Uuid::new_v4();

        let materialized = materializer
            .materialize(run_id, &exception_testing(), &[], &Map::new())
            .await
            .expect("materialize");

        assert_eq!(materialized.run_dir, dir.path().join(run_id.to_string()));
        assert!(materialized.output_dir.is_dir());

        let raw = std::fs::read_to_string(&materialized.config_path).expect("read config");
        let parsed: Value = serde_json::from_str(&raw).expect("parse config");
        assert_eq!(
            parsed[OUTPUT_DIRECTORY_KEY],
            &*materialized.output_dir.to_string_lossy()
        );
    }

    #[tokio::test]
    async fn rejected_options_leave_no_run_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let materializer = ConfigMaterializer::new(dir.path());
        let run_id = uuid::Uuid::new_v4();

        let result = materializer
            .materialize(
                run_id,
                &exception_testing(),
                &[],
                &options(json!({"output_directory": "x"})),
            )
            .await;

        assert_matches!(result, Err(CoreError::ConfigWrite(_)));
        assert!(!dir.path().join(run_id.to_string()).exists());
    }

    #[tokio::test]
    async fn unwritable_runs_dir_is_a_config_write_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A regular file where a directory is expected.
        let blocker = dir.path().join("runs");
        std::fs::write(&blocker, b"not a dir").expect("write blocker");

        let materializer = ConfigMaterializer::new(&blocker);
        let result = materializer
            .materialize(uuid::Uuid::new_v4(), &exception_testing(), &[], &Map::new())
            .await;
        assert_matches!(result, Err(CoreError::ConfigWrite(_)));
    }
}
