//! The results index: an append-only JSON document of collected artifacts.
//!
//! A single actor task owns the in-memory list and the `index.json` file.
//! Handles talk to it over a channel, so appends from concurrent runs are
//! applied one after another and none can overwrite another's entries.
//! Every write goes to `index.json.tmp` first and is renamed into place.

use std::path::{Path, PathBuf};

use auditflow_core::error::CoreError;
use auditflow_core::types::ArtifactId;
use tokio::sync::{mpsc, oneshot};

use crate::artifact::ResultArtifact;

/// File name of the index document inside the results directory.
pub const INDEX_FILE_NAME: &str = "index.json";

const INDEX_TMP_NAME: &str = "index.json.tmp";

enum Command {
    List {
        reply: oneshot::Sender<Vec<ResultArtifact>>,
    },
    Get {
        id: ArtifactId,
        reply: oneshot::Sender<Option<ResultArtifact>>,
    },
    Append {
        artifacts: Vec<ResultArtifact>,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
}

/// Cloneable handle to the results index actor.
///
/// The actor stops once every handle has been dropped.
#[derive(Clone)]
pub struct ResultsIndex {
    results_dir: PathBuf,
    tx: mpsc::UnboundedSender<Command>,
}

impl ResultsIndex {
    /// Open (or create) the index in `results_dir` and start its actor.
    ///
    /// An index file that cannot be parsed is renamed to
    /// `index.json.corrupted.<unix-ts>` and a fresh, empty index is started.
    pub async fn open(results_dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let results_dir = results_dir.into();
        tokio::fs::create_dir_all(&results_dir).await.map_err(|e| {
            CoreError::IndexWrite(format!("cannot create {}: {e}", results_dir.display()))
        })?;

        let entries = load_or_create(&results_dir).await?;
        tracing::info!(
            results_dir = %results_dir.display(),
            entries = entries.len(),
            "Results index opened",
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_actor(results_dir.clone(), entries, rx));
        Ok(Self { results_dir, tx })
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Every artifact, oldest first.
    pub async fn list(&self) -> Result<Vec<ResultArtifact>, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::List { reply })?;
        rx.await.map_err(|_| actor_gone())
    }

    /// Look up one artifact by id. Ids that are not UUIDs are never found.
    pub async fn get(&self, id: &str) -> Result<ResultArtifact, CoreError> {
        let not_found = || CoreError::NotFound(id.to_string());
        let parsed = ArtifactId::parse_str(id).map_err(|_| not_found())?;

        let (reply, rx) = oneshot::channel();
        self.send(Command::Get { id: parsed, reply })?;
        rx.await.map_err(|_| actor_gone())?.ok_or_else(not_found)
    }

    /// Path of the stored copy of artifact `id`.
    pub async fn locate(&self, id: &str) -> Result<PathBuf, CoreError> {
        Ok(self.get(id).await?.file_path)
    }

    /// Append `artifacts` as one write.
    ///
    /// Fails with [`CoreError::IndexWrite`] (leaving the index unchanged)
    /// when an id is already present or the file cannot be replaced.
    pub async fn append(&self, artifacts: Vec<ResultArtifact>) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Append { artifacts, reply })?;
        rx.await.map_err(|_| actor_gone())?
    }

    /// Copy artifact `id` to `destination` and return the written path.
    ///
    /// When `destination` is an existing directory the artifact's original
    /// file name is used inside it. Unknown ids copy nothing. Destinations
    /// inside the results directory, or resolving to the stored copy
    /// itself, are refused with [`CoreError::Export`].
    pub async fn export(&self, id: &str, destination: &Path) -> Result<PathBuf, CoreError> {
        let artifact = self.get(id).await?;

        let target = if tokio::fs::metadata(destination)
            .await
            .is_ok_and(|m| m.is_dir())
        {
            destination.join(artifact.export_name())
        } else {
            destination.to_path_buf()
        };
        self.check_export_target(&artifact.file_path, &target).await?;

        tokio::fs::copy(&artifact.file_path, &target)
            .await
            .map_err(|e| {
                CoreError::Export(format!(
                    "cannot copy {} to {}: {e}",
                    artifact.file_path.display(),
                    target.display()
                ))
            })?;

        tracing::info!(
            artifact_id = %artifact.id,
            destination = %target.display(),
            "Result exported",
        );
        Ok(target)
    }

    /// Stored copies are immutable; no export may write over one.
    async fn check_export_target(&self, source: &Path, target: &Path) -> Result<(), CoreError> {
        let refuse = |reason: &str| {
            Err(CoreError::Export(format!(
                "refusing to write {}: {reason}",
                target.display()
            )))
        };

        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        // A missing parent makes the copy itself fail with a clearer error.
        let Ok(parent) = tokio::fs::canonicalize(parent).await else {
            return Ok(());
        };
        if let Ok(results_dir) = tokio::fs::canonicalize(&self.results_dir).await {
            if parent.starts_with(&results_dir) {
                return refuse("destination is inside the results store");
            }
        }

        if let (Ok(source), Ok(existing)) = (
            tokio::fs::canonicalize(source).await,
            tokio::fs::canonicalize(target).await,
        ) {
            if source == existing {
                return refuse("destination is the stored result itself");
            }
        }
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), CoreError> {
        self.tx.send(command).map_err(|_| actor_gone())
    }
}

fn actor_gone() -> CoreError {
    CoreError::IndexWrite("results index is not running".into())
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

async fn run_actor(
    results_dir: PathBuf,
    mut entries: Vec<ResultArtifact>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::List { reply } => {
                let _ = reply.send(entries.clone());
            }
            Command::Get { id, reply } => {
                let _ = reply.send(entries.iter().find(|a| a.id == id).cloned());
            }
            Command::Append { artifacts, reply } => {
                let result = apply_append(&results_dir, &mut entries, artifacts).await;
                let _ = reply.send(result);
            }
        }
    }
    tracing::debug!("Results index actor stopped");
}

async fn apply_append(
    results_dir: &Path,
    entries: &mut Vec<ResultArtifact>,
    artifacts: Vec<ResultArtifact>,
) -> Result<(), CoreError> {
    for (i, artifact) in artifacts.iter().enumerate() {
        let clash = entries.iter().any(|a| a.id == artifact.id)
            || artifacts[..i].iter().any(|a| a.id == artifact.id);
        if clash {
            return Err(CoreError::IndexWrite(format!(
                "artifact id {} already exists",
                artifact.id
            )));
        }
    }

    let mut next = entries.clone();
    next.extend(artifacts);
    write_atomic(results_dir, &next).await?;

    tracing::debug!(entries = next.len(), "Results index written");
    *entries = next;
    Ok(())
}

/// Serialize the full list to the tmp file, then rename it over the index.
async fn write_atomic(results_dir: &Path, entries: &[ResultArtifact]) -> Result<(), CoreError> {
    let tmp = results_dir.join(INDEX_TMP_NAME);
    let target = results_dir.join(INDEX_FILE_NAME);

    let json = serde_json::to_vec_pretty(entries)
        .map_err(|e| CoreError::IndexWrite(format!("cannot serialize index: {e}")))?;
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| CoreError::IndexWrite(format!("cannot write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, &target).await.map_err(|e| {
        CoreError::IndexWrite(format!("cannot replace {}: {e}", target.display()))
    })?;
    Ok(())
}

async fn load_or_create(results_dir: &Path) -> Result<Vec<ResultArtifact>, CoreError> {
    let path = results_dir.join(INDEX_FILE_NAME);
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CoreError::IndexWrite(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    match serde_json::from_str(&raw) {
        Ok(entries) => Ok(entries),
        Err(parse_err) => {
            let backup = results_dir.join(format!(
                "{INDEX_FILE_NAME}.corrupted.{}",
                chrono::Utc::now().timestamp()
            ));
            tokio::fs::rename(&path, &backup).await.map_err(|e| {
                CoreError::IndexWrite(format!("cannot back up corrupt index: {e}"))
            })?;
            tracing::warn!(
                backup = %backup.display(),
                error = %parse_err,
                "Results index corrupted, starting a fresh one",
            );
            Ok(Vec::new())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
