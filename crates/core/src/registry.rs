//! Script registry: the immutable catalog of invocable worker scripts.
//!
//! Built once at startup (from the builtin payroll catalog or a JSON
//! manifest) and shared by `Arc`. There is no mutation API.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::InputRole;

/// How to invoke one logical script and what it is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDefinition {
    /// Unique logical key, e.g. `"exception_testing"`.
    pub key: String,
    /// Worker file handed to the interpreter.
    pub entry_point: PathBuf,
    /// Human label, copied onto every artifact the script produces.
    pub label: String,
    /// Files expected in the output directory. Empty means "collect
    /// everything the worker leaves there".
    #[serde(default)]
    pub declared_outputs: Vec<String>,
    /// Roles assigned by position to inputs that have neither an explicit
    /// tag nor a filename match.
    #[serde(default)]
    pub positional_roles: Vec<InputRole>,
    /// Option keys forwarded to the worker's stdin as a JSON object.
    #[serde(default)]
    pub stdin_options: Vec<String>,
}

impl ScriptDefinition {
    pub fn new(key: impl Into<String>, entry_point: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entry_point: entry_point.into(),
            label: label.into(),
            declared_outputs: Vec::new(),
            positional_roles: Vec::new(),
            stdin_options: Vec::new(),
        }
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_positional_roles(mut self, roles: &[InputRole]) -> Self {
        self.positional_roles = roles.to_vec();
        self
    }

    pub fn with_stdin_options(mut self, keys: &[&str]) -> Self {
        self.stdin_options = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }
}

/// Read-only lookup table from script key to [`ScriptDefinition`].
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    scripts: BTreeMap<String, ScriptDefinition>,
}

impl ScriptRegistry {
    /// Build a registry, rejecting empty or duplicate keys.
    pub fn new(definitions: Vec<ScriptDefinition>) -> Result<Self, CoreError> {
        let mut scripts = BTreeMap::new();
        for def in definitions {
            if def.key.trim().is_empty() {
                return Err(CoreError::InvalidRegistry(
                    "script key must not be empty".into(),
                ));
            }
            if scripts.contains_key(&def.key) {
                return Err(CoreError::InvalidRegistry(format!(
                    "duplicate script key '{}'",
                    def.key
                )));
            }
            scripts.insert(def.key.clone(), def);
        }
        Ok(Self { scripts })
    }

    /// Load definitions from a JSON manifest (an array of definitions).
    ///
    /// Relative entry points are resolved against the manifest's directory.
    pub fn from_manifest(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::InvalidRegistry(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut definitions: Vec<ScriptDefinition> = serde_json::from_str(&raw).map_err(|e| {
            CoreError::InvalidRegistry(format!("cannot parse {}: {e}", path.display()))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for def in &mut definitions {
            if def.entry_point.is_relative() {
                def.entry_point = base.join(&def.entry_point);
            }
        }
        Self::new(definitions)
    }

    /// The payroll catalog shipped with the audit tool.
    ///
    /// `codes_dir` holds the payroll module dispatcher (`main.py`);
    /// `scripts_dir` holds the standalone execution scripts.
    pub fn builtin(codes_dir: &Path, scripts_dir: &Path) -> Self {
        use InputRole::*;

        let main = codes_dir.join("main.py");
        let script = |name: &str| scripts_dir.join(format!("{name}.py"));

        let mut definitions = vec![
            ScriptDefinition::new("ipe_testing", &main, "IPE Testing")
                .with_outputs(["ipe_output.json"])
                .with_positional_roles(&[PayRegistrar, CtcFile]),
            ScriptDefinition::new("exception_testing", &main, "Exception Testing")
                .with_outputs(["Exception Testing.xlsx"])
                .with_positional_roles(&[PayRegistrar, CtcFile]),
            ScriptDefinition::new("headcount_reconciliation", &main, "Headcount Reconciliation")
                .with_outputs(["Headcount Reconcilation.json"])
                .with_positional_roles(&[PayRegistrar, AdditionsList, DeletionsList, CtcFile]),
            ScriptDefinition::new("mom_analysis", &main, "Month-on-Month Analysis")
                .with_outputs(["Mom Increment.xlsx"])
                .with_positional_roles(&[PayRegistrar, CtcFile]),
            ScriptDefinition::new("increment_analysis", &main, "Increment Analysis")
                .with_outputs(["Increment_Analysis.json"])
                .with_positional_roles(&[CtcFile, CtcPreviousYear]),
            ScriptDefinition::new("pf_sal_analytics", &main, "PF & Salary Analytics")
                .with_outputs(["pf_calculations.json", "salary_calculations.json"]),
            ScriptDefinition::new("actuary_testing", &main, "Actuary Testing")
                .with_outputs(["actuary_testing.json"])
                .with_positional_roles(&[ActuaryFile, CtcFile]),
            ScriptDefinition::new("accuracy_check", &main, "Accuracy Check")
                .with_outputs(["CTC_Actuary.xlsx"])
                .with_positional_roles(&[ActuaryFile, CtcFile]),
            ScriptDefinition::new(
                "pay_registrar_processor",
                codes_dir.join("pay_registrar_processor.py"),
                "Pay Registrar Processor",
            )
            .with_outputs(["Execution_Payroll_PRColumnMap.json"]),
            ScriptDefinition::new(
                "execute_exception_sharepoint",
                script("execute_exception_sharepoint"),
                "Execution Payroll Exception Testing",
            )
            .with_stdin_options(&["pay_registrar", "expn_no"]),
            ScriptDefinition::new(
                "execute_increment_analysis_sharepoint",
                script("execute_increment_analysis_sharepoint"),
                "Execution Payroll Increment Analysis",
            )
            .with_stdin_options(&[
                "cy_file",
                "py_file",
                "incr_columns",
                "cols_to_sum",
                "reconcile_input",
            ]),
        ];

        // Standalone scripts that collect whatever they leave behind.
        for (key, label) in [
            ("load_excel_columns", "Load Excel Columns"),
            ("load_excel_columns_direct", "Load Excel Columns Direct"),
            ("test_python", "Test Python"),
            ("execute_ipe_testing", "Execute IPE Testing"),
            ("execute_headcount_sharepoint", "Execution Payroll Headcount Reconciliation"),
            ("download_headcount_results", "Download Headcount Results"),
            ("execute_mom_increment_sharepoint", "Execution Payroll MoM Increment"),
            ("execute_salary_analytical", "Execution Payroll Salary Analytical"),
            ("execute_actuary_testing", "Execution Payroll Actuary Testing"),
            ("execute_ppe_ipe_mapping", "Execution PPE IPE Mapping"),
            ("execute_ppe_exception_testing", "Execution PPE Exception Testing"),
            ("execute_ppe_cwip_analysis", "Execution PPE CWIP Analysis"),
        ] {
            definitions.push(ScriptDefinition::new(key, script(key), label));
        }

        let scripts = definitions
            .into_iter()
            .map(|def| (def.key.clone(), def))
            .collect();
        Self { scripts }
    }

    /// Look up a script by key.
    pub fn resolve(&self, key: &str) -> Result<&ScriptDefinition, CoreError> {
        self.scripts
            .get(key)
            .ok_or_else(|| CoreError::UnknownScript(key.to_string()))
    }

    /// All definitions, ordered by key.
    pub fn list(&self) -> impl Iterator<Item = &ScriptDefinition> {
        self.scripts.values()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
