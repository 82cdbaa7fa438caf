//! Interface validation. Run this before persisting an interface or
//! offering it for execution.
//!
//! Rules enforced:
//! 1. Step IDs must be unique within the interface.
//! 2. Each step's `order` must equal its position plus one.
//! 3. Step types must be `rpc` or `sql`.
//! 4. Every `referenceId` must exist in the matching catalog.
//! 5. Back-references must point at an earlier step.
//!
//! Back-references to fields that the referenced catalog entry does not
//! declare as an output are reported as warnings, not errors, since catalogs
//! often lag behind what the remote side actually returns.

use std::collections::{BTreeSet, HashSet};

use adapters::sql::{ROWS_AFFECTED_KEY, ROWS_KEY, ROW_COUNT_KEY};

use crate::models::{Catalog, InterfaceDefinition, Step, StepType};
use crate::params::ParamExpr;
use crate::EngineError;

/// Non-fatal findings of [`validate_interface`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Validate `interface` against `catalog`.
///
/// # Errors
/// - [`EngineError::DuplicateStepId`] if two steps share an ID.
/// - [`EngineError::StepOrderMismatch`] if `order` disagrees with position.
/// - [`EngineError::UnsupportedStepType`] for a step type other than rpc/sql.
/// - [`EngineError::UnknownReference`] if a catalog entry is missing.
/// - [`EngineError::InvalidBackReference`] for a reference to step 0, the
///   step itself, or a later step.
pub fn validate_interface(
    interface: &InterfaceDefinition,
    catalog: &Catalog,
) -> Result<ValidationReport, EngineError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &interface.steps {
        if !seen_ids.insert(step.id.as_str()) {
            return Err(EngineError::DuplicateStepId(step.id.clone()));
        }
    }

    // Declared outputs per step, `None` when the catalog declares none.
    let mut outputs: Vec<Option<BTreeSet<String>>> = Vec::with_capacity(interface.steps.len());
    let mut report = ValidationReport::default();

    for (idx, step) in interface.steps.iter().enumerate() {
        let position = idx + 1;

        let expected = position as u32;
        if step.order != expected {
            return Err(EngineError::StepOrderMismatch {
                step_id: step.id.clone(),
                expected,
                found: step.order,
            });
        }

        outputs.push(declared_outputs(position, step, catalog)?);

        for (parameter, expr) in &step.parameters {
            let ParamExpr::StepReference { step: target, field } = expr else {
                continue;
            };
            if *target == 0 || *target >= position {
                return Err(EngineError::InvalidBackReference {
                    step: position,
                    parameter: parameter.clone(),
                    reference: expr.to_string(),
                });
            }
            if let Some(declared) = &outputs[*target - 1] {
                if !declared.contains(field) {
                    report.warnings.push(format!(
                        "step {position} parameter '{parameter}' references '{expr}', but step {target} does not declare output '{field}'"
                    ));
                }
            }
        }
    }

    Ok(report)
}

fn declared_outputs(
    position: usize,
    step: &Step,
    catalog: &Catalog,
) -> Result<Option<BTreeSet<String>>, EngineError> {
    match &step.step_type {
        StepType::Rpc => {
            let function = catalog.find_rpc(&step.reference_id).ok_or_else(|| EngineError::UnknownReference {
                step: position,
                catalog: "RFC function",
                reference_id: step.reference_id.clone(),
            })?;
            let names = function.output_names();
            Ok((!names.is_empty()).then(|| names.into_iter().map(str::to_owned).collect()))
        }
        StepType::Sql => {
            let query = catalog.find_sql(&step.reference_id).ok_or_else(|| EngineError::UnknownReference {
                step: position,
                catalog: "SQL query",
                reference_id: step.reference_id.clone(),
            })?;
            if query.output_params.is_empty() {
                return Ok(None);
            }
            let mut names = query.output_params.clone();
            names.extend([ROWS_KEY, ROW_COUNT_KEY, ROWS_AFFECTED_KEY].map(str::to_owned));
            Ok(Some(names))
        }
        StepType::Unsupported(other) => Err(EngineError::UnsupportedStepType {
            step: position,
            step_type: other.clone(),
        }),
    }
}
