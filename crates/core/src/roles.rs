//! Semantic roles for worker input files.
//!
//! A role decides which config key an input path is written under. Callers
//! should tag inputs explicitly; [`guess_from_filename`] is a best-effort
//! fallback that only looks at the file name and is frequently wrong for
//! anything outside the payroll naming conventions it was written for.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The closed set of input roles a worker understands.
///
/// On the wire a role is named by its config key. The longer descriptive
/// names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputRole {
    #[serde(rename = "pay_registrar")]
    PayRegistrar,
    #[serde(rename = "ctc_file")]
    CtcFile,
    #[serde(rename = "ctc_py_file", alias = "ctc_previous_year")]
    CtcPreviousYear,
    #[serde(rename = "add_list", alias = "additions_list")]
    AdditionsList,
    #[serde(rename = "del_list", alias = "deletions_list")]
    DeletionsList,
    #[serde(rename = "actuary_file")]
    ActuaryFile,
    #[serde(rename = "combined_json_path", alias = "combined_json")]
    CombinedJson,
}

impl InputRole {
    /// Config key the worker reads this input from.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::PayRegistrar => "pay_registrar",
            Self::CtcFile => "ctc_file",
            Self::CtcPreviousYear => "ctc_py_file",
            Self::AdditionsList => "add_list",
            Self::DeletionsList => "del_list",
            Self::ActuaryFile => "actuary_file",
            Self::CombinedJson => "combined_json_path",
        }
    }
}

/// One caller-supplied input file with an optional explicit role tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    #[serde(default)]
    pub role: Option<InputRole>,
}

impl InputFile {
    pub fn untagged(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            role: None,
        }
    }

    pub fn tagged(path: impl Into<PathBuf>, role: InputRole) -> Self {
        Self {
            path: path.into(),
            role: Some(role),
        }
    }
}

/// Guess a role from filename substrings (case-insensitive).
///
/// Order matters: "ctc" + "prev" must be tested before plain "ctc".
pub fn guess_from_filename(path: &Path) -> Option<InputRole> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if name.contains("pay") && name.contains("registrar") {
        Some(InputRole::PayRegistrar)
    } else if name.contains("ctc") && name.contains("prev") {
        Some(InputRole::CtcPreviousYear)
    } else if name.contains("ctc") {
        Some(InputRole::CtcFile)
    } else if name.contains("addition") {
        Some(InputRole::AdditionsList)
    } else if name.contains("deletion") {
        Some(InputRole::DeletionsList)
    } else if name.contains("actuary") {
        Some(InputRole::ActuaryFile)
    } else if is_json && name.contains("combined") {
        Some(InputRole::CombinedJson)
    } else {
        None
    }
}
