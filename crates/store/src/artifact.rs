//! The persisted record of one collected result file.

use std::path::{Path, PathBuf};

use auditflow_core::types::{ArtifactId, RunId, Timestamp};
use serde::{Deserialize, Serialize};

/// One entry of the results index.
///
/// The first six fields are the historical index format; the rest were
/// added later and are optional so older index files still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultArtifact {
    pub id: ArtifactId,
    /// Label of the script that produced the file.
    pub label: String,
    pub created_at: Timestamp,
    /// Location of the copy inside the results directory.
    pub file_path: PathBuf,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_key: Option<String>,
    /// File name the worker gave the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

impl ResultArtifact {
    /// File name to use when the artifact is exported into a directory.
    pub fn export_name(&self) -> String {
        self.original_name
            .clone()
            .or_else(|| {
                self.file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Best-effort MIME type from the file extension.
pub fn mime_type_for(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xlsx_mime_type() {
        assert_eq!(
            mime_type_for(Path::new("Exception Testing.xlsx")).as_deref(),
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        );
        assert_eq!(
            mime_type_for(Path::new("ipe_output.json")).as_deref(),
            Some("application/json")
        );
        assert_eq!(mime_type_for(Path::new("no_extension")), None);
    }

    #[test]
    fn legacy_entry_without_new_fields_loads() {
        let raw = r#"{
            "id": "6f1c1f7e-8d0a-4a55-9a43-2f7f0f3c9e11",
            "label": "IPE Testing",
            "createdAt": "2025-03-01T10:00:00Z",
            "filePath": "/data/results/6f1c1f7e-8d0a-4a55-9a43-2f7f0f3c9e11.json",
            "size": 512
        }"#;
        let artifact: ResultArtifact = serde_json::from_str(raw).expect("parse");
        assert_eq!(artifact.label, "IPE Testing");
        assert!(artifact.mime_type.is_none());
        assert!(artifact.run_id.is_none());
        assert_eq!(
            artifact.export_name(),
            "6f1c1f7e-8d0a-4a55-9a43-2f7f0f3c9e11.json"
        );
    }

    #[test]
    fn serializes_camel_case() {
        let artifact = ResultArtifact {
            id: uuid::Uuid::new_v4(),
            label: "Exception Testing".into(),
            created_at: chrono::Utc::now(),
            file_path: "/r/x.xlsx".into(),
            size: 10,
            mime_type: None,
            run_id: None,
            script_key: Some("exception_testing".into()),
            original_name: Some("Exception Testing.xlsx".into()),
        };
        let json = serde_json::to_value(&artifact).expect("serialize");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("filePath").is_some());
        assert_eq!(json["scriptKey"], "exception_testing");
        assert!(json.get("mimeType").is_none());
        assert_eq!(artifact.export_name(), "Exception Testing.xlsx");
    }
}
