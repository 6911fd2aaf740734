//! Collection of worker outputs into the results store.

use std::path::{Path, PathBuf};

use auditflow_core::error::CoreError;
use auditflow_core::registry::ScriptDefinition;
use auditflow_core::types::RunId;

use crate::artifact::{mime_type_for, ResultArtifact};
use crate::index::ResultsIndex;

/// Copies a finished run's outputs into the results directory and records
/// them in the index.
#[derive(Clone)]
pub struct OutputCollector {
    index: ResultsIndex,
}

impl OutputCollector {
    pub fn new(index: ResultsIndex) -> Self {
        Self { index }
    }

    /// Collect the outputs of a successful run from `output_dir`.
    ///
    /// With declared outputs only those names are considered and missing
    /// ones are skipped; otherwise every regular file in the directory is.
    /// A file that fails to copy is skipped. The copies are appended to the
    /// index in one batch; if that fails they are removed again and
    /// [`CoreError::IndexWrite`] is returned.
    pub async fn collect(
        &self,
        run_id: RunId,
        script: &ScriptDefinition,
        output_dir: &Path,
    ) -> Result<Vec<ResultArtifact>, CoreError> {
        let candidates = candidates(script, output_dir).await;
        let mut artifacts = Vec::with_capacity(candidates.len());

        for source in candidates {
            match self.store_copy(run_id, script, &source).await {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => tracing::warn!(
                    run_id = %run_id,
                    source = %source.display(),
                    error = %e,
                    "Failed to copy worker output, skipping",
                ),
            }
        }

        if artifacts.is_empty() {
            tracing::info!(run_id = %run_id, script_key = %script.key, "Run produced no artifacts");
            return Ok(artifacts);
        }

        if let Err(e) = self.index.append(artifacts.clone()).await {
            for artifact in &artifacts {
                let _ = tokio::fs::remove_file(&artifact.file_path).await;
            }
            return Err(e);
        }

        tracing::info!(
            run_id = %run_id,
            script_key = %script.key,
            count = artifacts.len(),
            "Run artifacts collected",
        );
        Ok(artifacts)
    }

    async fn store_copy(
        &self,
        run_id: RunId,
        script: &ScriptDefinition,
        source: &Path,
    ) -> std::io::Result<ResultArtifact> {
        let id = uuid::Uuid::new_v4();
        let extension = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let target = self.index.results_dir().join(format!("{id}{extension}"));

        let size = tokio::fs::copy(source, &target).await?;
        tracing::debug!(
            artifact_id = %id,
            source = %source.display(),
            target = %target.display(),
            size,
            "Worker output copied",
        );

        Ok(ResultArtifact {
            id,
            label: script.label.clone(),
            created_at: chrono::Utc::now(),
            mime_type: mime_type_for(source),
            file_path: target,
            size,
            run_id: Some(run_id),
            script_key: Some(script.key.clone()),
            original_name: source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
        })
    }
}

/// Files eligible for collection, in a stable order.
async fn candidates(script: &ScriptDefinition, output_dir: &Path) -> Vec<PathBuf> {
    if !script.declared_outputs.is_empty() {
        let mut found = Vec::new();
        for name in &script.declared_outputs {
            let path = output_dir.join(name);
            if is_regular_file(&path).await {
                found.push(path);
            } else {
                tracing::debug!(
                    script_key = %script.key,
                    output = %name,
                    "Declared output not produced",
                );
            }
        }
        return found;
    }

    let mut entries = match tokio::fs::read_dir(output_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                output_dir = %output_dir.display(),
                error = %e,
                "Cannot list run output directory",
            );
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.is_ok_and(|t| t.is_file()) {
            found.push(entry.path());
        }
    }
    found.sort();
    found
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::index::INDEX_FILE_NAME;

    struct Fixture {
        _dir: tempfile::TempDir,
        output_dir: PathBuf,
        results_dir: PathBuf,
        collector: OutputCollector,
        index: ResultsIndex,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let output_dir = dir.path().join("outputs");
        let results_dir = dir.path().join("results");
        std::fs::create_dir_all(&output_dir).expect("mkdir outputs");
        let index = ResultsIndex::open(&results_dir).await.expect("open index");
        Fixture {
            _dir: dir,
            output_dir,
            results_dir,
            collector: OutputCollector::new(index.clone()),
            index,
        }
    }

    fn stored_files(results_dir: &Path) -> Vec<String> {
        std::fs::read_dir(results_dir)
            .expect("read dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with(INDEX_FILE_NAME))
            .collect()
    }

    #[tokio::test]
    async fn declared_output_becomes_artifact() {
        let fx = fixture().await;
        let script = ScriptDefinition::new("exception_testing", "/w/main.py", "Exception Testing")
            .with_outputs(["Exception Testing.xlsx"]);
        std::fs::write(fx.output_dir.join("Exception Testing.xlsx"), b"PK").expect("write");

        let run_id = uuid::Uuid::new_v4();
        let artifacts = fx
            .collector
            .collect(run_id, &script, &fx.output_dir)
            .await
            .expect("collect");

        assert_eq!(artifacts.len(), 1);
        let artifact = &artifacts[0];
        assert_eq!(artifact.label, "Exception Testing");
        assert_eq!(artifact.size, 2);
        assert_eq!(artifact.run_id, Some(run_id));
        assert_eq!(
            artifact.mime_type.as_deref(),
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        );
        assert_eq!(
            artifact.file_path,
            fx.results_dir.join(format!("{}.xlsx", artifact.id))
        );
        assert_eq!(fx.index.list().await.expect("list"), artifacts);
    }

    #[tokio::test]
    async fn missing_declared_outputs_are_skipped() {
        let fx = fixture().await;
        let script = ScriptDefinition::new("pf_sal_analytics", "/w/main.py", "PF")
            .with_outputs(["pf_calculations.json", "salary_calculations.json"]);
        std::fs::write(fx.output_dir.join("pf_calculations.json"), b"{}").expect("write");

        let artifacts = fx
            .collector
            .collect(uuid::Uuid::new_v4(), &script, &fx.output_dir)
            .await
            .expect("collect");

        assert_eq!(artifacts.len(), 1);
        assert_eq!(
            artifacts[0].original_name.as_deref(),
            Some("pf_calculations.json")
        );
    }

    #[tokio::test]
    async fn undeclared_script_collects_every_regular_file() {
        let fx = fixture().await;
        let script = ScriptDefinition::new("execute_ppe_cwip_analysis", "/w/x.py", "CWIP");
        std::fs::write(fx.output_dir.join("b.csv"), b"1").expect("write");
        std::fs::write(fx.output_dir.join("a.json"), b"[]").expect("write");
        std::fs::create_dir(fx.output_dir.join("nested")).expect("mkdir");

        let artifacts = fx
            .collector
            .collect(uuid::Uuid::new_v4(), &script, &fx.output_dir)
            .await
            .expect("collect");

        let names: Vec<_> = artifacts
            .iter()
            .filter_map(|a| a.original_name.as_deref())
            .collect();
        assert_eq!(names, vec!["a.json", "b.csv"]);
    }

    #[tokio::test]
    async fn empty_output_yields_no_artifacts_and_no_write() {
        let fx = fixture().await;
        let script = ScriptDefinition::new("test_python", "/w/t.py", "Test Python");

        let artifacts = fx
            .collector
            .collect(uuid::Uuid::new_v4(), &script, &fx.output_dir)
            .await
            .expect("collect");

        assert!(artifacts.is_empty());
        assert!(!fx.results_dir.join(INDEX_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn index_failure_removes_copies() {
        let fx = fixture().await;
        let script = ScriptDefinition::new("test_python", "/w/t.py", "Test Python");
        std::fs::write(fx.output_dir.join("out.json"), b"{}").expect("write");
        std::fs::create_dir(fx.results_dir.join("index.json.tmp")).expect("block tmp");

        let result = fx
            .collector
            .collect(uuid::Uuid::new_v4(), &script, &fx.output_dir)
            .await;

        assert_matches!(result, Err(CoreError::IndexWrite(_)));
        assert!(stored_files(&fx.results_dir).is_empty());
    }
}
