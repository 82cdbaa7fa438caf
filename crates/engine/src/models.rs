//! Core domain models: interfaces, their steps, and the catalogs steps refer
//! to.
//!
//! These are owned by the management layer and arrive as JSON (camelCase
//! field names). The engine only reads them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use adapters::ResultMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::params::ParamExpr;

// ---------------------------------------------------------------------------
// StepType
// ---------------------------------------------------------------------------

/// What a step invokes. Unknown type strings are kept so the engine can
/// report them when the step is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepType {
    Rpc,
    Sql,
    Unsupported(String),
}

impl From<String> for StepType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "rpc" => Self::Rpc,
            "sql" => Self::Sql,
            _ => Self::Unsupported(s),
        }
    }
}

impl From<StepType> for String {
    fn from(t: StepType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc => write!(f, "rpc"),
            Self::Sql => write!(f, "sql"),
            Self::Unsupported(other) => write!(f, "{other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One call in an interface pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub name: String,
    /// ID of an [`RpcFunctionInfo`] or [`SqlInfo`], depending on `step_type`.
    pub reference_id: String,
    /// 1-based position; kept equal to the index in `steps` plus one.
    pub order: u32,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamExpr>,
}

// ---------------------------------------------------------------------------
// InterfaceDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Execution order is the order of this list.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl InterfaceDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
            steps: Vec::new(),
        }
    }

    /// Append a step, assigning its `order`.
    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step);
        self.touch();
    }

    /// Remove the step with `step_id`, renumbering the ones after it.
    pub fn remove_step(&mut self, step_id: &str) -> Option<Step> {
        let idx = self.steps.iter().position(|s| s.id == step_id)?;
        let removed = self.steps.remove(idx);
        self.touch();
        Some(removed)
    }

    /// Move the step at index `from` to index `to` (both 0-based).
    ///
    /// Back-references in parameters are not rewritten.
    pub fn move_step(&mut self, from: usize, to: usize) -> bool {
        if from >= self.steps.len() || to >= self.steps.len() {
            return false;
        }
        let step = self.steps.remove(from);
        self.steps.insert(to, step);
        self.touch();
        true
    }

    fn touch(&mut self) {
        for (idx, step) in self.steps.iter_mut().enumerate() {
            step.order = (idx + 1) as u32;
        }
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// RFC catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamDirection {
    Import,
    Export,
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcParameter {
    pub name: String,
    pub direction: ParamDirection,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcFunctionInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Remote procedure identifier, e.g. `BAPI_CUSTOMER_GETDETAIL`.
    pub function_name: String,
    #[serde(default)]
    pub parameters: Vec<RpcParameter>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl RpcFunctionInfo {
    pub fn parameter(&self, name: &str) -> Option<&RpcParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names of the parameters the function returns (export and table).
    pub fn output_names(&self) -> BTreeSet<&str> {
        self.parameters
            .iter()
            .filter(|p| p.direction != ParamDirection::Import)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Shape resolved step values into the import map for a call.
    ///
    /// Values for parameters declared as export/table are dropped and their
    /// names returned; declared imports without a value get their default;
    /// undeclared names pass through.
    pub fn shape_imports(&self, values: ResultMap) -> (ResultMap, Vec<String>) {
        let mut imports = ResultMap::new();
        let mut dropped = Vec::new();

        for (name, value) in values {
            match self.parameter(&name) {
                Some(p) if p.direction != ParamDirection::Import => dropped.push(name),
                _ => {
                    imports.insert(name, value);
                }
            }
        }

        for p in &self.parameters {
            if p.direction != ParamDirection::Import || imports.contains_key(&p.name) {
                continue;
            }
            if let Some(default) = &p.default_value {
                imports.insert(p.name.clone(), default.clone());
            }
        }

        (imports, dropped)
    }
}

// ---------------------------------------------------------------------------
// SQL catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Template with `:name` placeholders.
    pub sql_text: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Declared placeholder names.
    #[serde(default)]
    pub parameters: BTreeSet<String>,
    /// Declared output field names.
    #[serde(default)]
    pub output_params: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The RFC-function and SQL definitions steps can reference by ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub rpc_functions: Vec<RpcFunctionInfo>,
    #[serde(default)]
    pub sql_queries: Vec<SqlInfo>,
}

impl Catalog {
    pub fn find_rpc(&self, id: &str) -> Option<&RpcFunctionInfo> {
        self.rpc_functions.iter().find(|f| f.id == id)
    }

    pub fn find_sql(&self, id: &str) -> Option<&SqlInfo> {
        self.sql_queries.iter().find(|q| q.id == id)
    }
}
