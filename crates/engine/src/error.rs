//! Engine-level error types.

use std::fmt;

use serde_json::{json, Value};
use thiserror::Error;

/// Which connection a step needed but did not get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Rfc,
    Database,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rfc => write!(f, "RFC"),
            Self::Database => write!(f, "database"),
        }
    }
}

/// Errors produced by the engine (validation + execution).
///
/// Step numbers are 1-based, matching back-reference syntax.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more steps share the same ID.
    #[error("duplicate step ID: '{0}'")]
    DuplicateStepId(String),

    /// A step's `order` disagrees with its position in the step list.
    #[error("step '{step_id}' has order {found}, expected {expected}")]
    StepOrderMismatch {
        step_id: String,
        expected: u32,
        found: u32,
    },

    /// A back-reference points at the step itself, a later step, or step 0.
    #[error("step {step} parameter '{parameter}' references '{reference}', which is not an earlier step")]
    InvalidBackReference {
        step: usize,
        parameter: String,
        reference: String,
    },

    // ------ Execution errors ------

    #[error("step {step} has unsupported type '{step_type}'")]
    UnsupportedStepType { step: usize, step_type: String },

    #[error("step {step} needs a {kind} connection, but none was selected")]
    MissingConnection { step: usize, kind: ConnectionKind },

    /// The step points at a catalog entry that does not exist.
    #[error("step {step} references unknown {catalog} '{reference_id}'")]
    UnknownReference {
        step: usize,
        catalog: &'static str,
        reference_id: String,
    },

    #[error("RFC function '{function}' failed: {message}")]
    RemoteCallFailed {
        step: usize,
        function: String,
        message: String,
    },

    #[error("SQL execution failed: {message}")]
    SqlExecutionFailed { step: usize, message: String },

    /// Only raised in strict mode; lenient runs downgrade this to a warning.
    #[error("step {step} parameter '{parameter}' references '{reference}', which has no value")]
    UnresolvedParameterReference {
        step: usize,
        parameter: String,
        reference: String,
    },

    /// The tracker already drives a run.
    #[error("a run is already in progress")]
    RunInProgress,
}

impl EngineError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateStepId(_) => "DuplicateStepId",
            Self::StepOrderMismatch { .. } => "StepOrderMismatch",
            Self::InvalidBackReference { .. } => "InvalidBackReference",
            Self::UnsupportedStepType { .. } => "UnsupportedStepType",
            Self::MissingConnection { .. } => "MissingConnection",
            Self::UnknownReference { .. } => "UnknownReference",
            Self::RemoteCallFailed { .. } => "RemoteCallFailed",
            Self::SqlExecutionFailed { .. } => "SqlExecutionFailed",
            Self::UnresolvedParameterReference { .. } => "UnresolvedParameterReference",
            Self::RunInProgress => "RunInProgress",
        }
    }

    /// Payload for the `details` of an error log entry. Adapter failures keep
    /// the adapter's message verbatim under `cause`.
    pub fn details(&self) -> Value {
        let mut details = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        match self {
            Self::RemoteCallFailed { step, message, .. } | Self::SqlExecutionFailed { step, message } => {
                details["step"] = json!(step);
                details["cause"] = json!(message);
            }
            Self::UnsupportedStepType { step, .. }
            | Self::MissingConnection { step, .. }
            | Self::UnknownReference { step, .. }
            | Self::UnresolvedParameterReference { step, .. } => {
                details["step"] = json!(step);
            }
            _ => {}
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_message_is_kept_verbatim_in_details() {
        let err = EngineError::RemoteCallFailed {
            step: 2,
            function: "Z_GET".into(),
            message: "RFC_ERROR_LOGON_FAILURE: Name or password is incorrect".into(),
        };
        let details = err.details();

        assert_eq!(details["kind"], "RemoteCallFailed");
        assert_eq!(details["step"], 2);
        assert_eq!(details["cause"], "RFC_ERROR_LOGON_FAILURE: Name or password is incorrect");
    }

    #[test]
    fn missing_connection_message_names_the_kind() {
        let err = EngineError::MissingConnection { step: 1, kind: ConnectionKind::Database };
        assert_eq!(err.to_string(), "step 1 needs a database connection, but none was selected");
    }
}
