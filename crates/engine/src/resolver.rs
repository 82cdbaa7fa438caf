//! Step parameter resolution.
//!
//! Turns a step's parameter expressions into concrete values using the
//! results of the steps that already ran. Resolution never fails: a
//! reference that cannot be satisfied yields `null` and is reported in
//! [`Resolution::unresolved`]. Whether that is fatal is the engine's call.

use std::collections::BTreeMap;
use std::fmt;

use adapters::ResultMap;
use serde_json::Value;

use crate::params::ParamExpr;

/// A back-reference that had no value to resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub parameter: String,
    pub step: usize,
    pub field: String,
}

impl UnresolvedReference {
    /// The reference in wire syntax, e.g. `1.FOO`.
    pub fn reference(&self) -> String {
        format!("{}.{}", self.step, self.field)
    }
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter '{}' references '{}', which is not available; using null",
            self.parameter,
            self.reference()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub values: ResultMap,
    pub unresolved: Vec<UnresolvedReference>,
}

impl Resolution {
    pub fn warnings(&self) -> Vec<String> {
        self.unresolved.iter().map(ToString::to_string).collect()
    }
}

/// Resolve `parameters` against `prior`, the results of the steps that
/// completed so far (index 0 holds step 1's result).
pub fn resolve(parameters: &BTreeMap<String, ParamExpr>, prior: &[ResultMap]) -> Resolution {
    let mut resolution = Resolution::default();

    for (name, expr) in parameters {
        let value = match expr {
            ParamExpr::Literal(v) => v.clone(),
            ParamExpr::StepReference { step, field } => {
                let found = step
                    .checked_sub(1)
                    .and_then(|idx| prior.get(idx))
                    .and_then(|result| result.get(field));
                match found {
                    Some(v) => v.clone(),
                    None => {
                        resolution.unresolved.push(UnresolvedReference {
                            parameter: name.clone(),
                            step: *step,
                            field: field.clone(),
                        });
                        Value::Null
                    }
                }
            }
        };
        resolution.values.insert(name.clone(), value);
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(value: Value) -> ResultMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn params(pairs: &[(&str, ParamExpr)]) -> BTreeMap<String, ParamExpr> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn back_reference_takes_the_prior_field_value() {
        let prior = vec![result(json!({ "FOO": 42 }))];
        let res = resolve(&params(&[("X", ParamExpr::reference(1, "FOO"))]), &prior);

        assert_eq!(res.values["X"], 42);
        assert!(res.unresolved.is_empty());
    }

    #[test]
    fn missing_field_resolves_to_null_with_a_warning() {
        let prior = vec![result(json!({ "FOO": 42 }))];
        let res = resolve(&params(&[("X", ParamExpr::reference(1, "BAR"))]), &prior);

        assert_eq!(res.values["X"], Value::Null);
        assert_eq!(res.unresolved.len(), 1);
        assert_eq!(res.unresolved[0].reference(), "1.BAR");
        assert!(res.warnings()[0].contains("'1.BAR'"));
    }

    #[test]
    fn out_of_range_steps_resolve_to_null() {
        let prior = vec![result(json!({ "FOO": 1 }))];
        let res = resolve(
            &params(&[
                ("ZERO", ParamExpr::reference(0, "FOO")),
                ("LATER", ParamExpr::reference(2, "FOO")),
                ("HUGE", ParamExpr::reference(usize::MAX, "FOO")),
            ]),
            &prior,
        );

        assert_eq!(res.values.len(), 3);
        assert!(res.values.values().all(Value::is_null));
        assert_eq!(res.unresolved.len(), 3);
    }

    #[test]
    fn literals_pass_through_verbatim() {
        let res = resolve(
            &params(&[
                ("S", ParamExpr::literal("ABC")),
                ("N", ParamExpr::literal(3.5)),
                ("O", ParamExpr::literal(json!({ "k": [1, 2] }))),
            ]),
            &[],
        );

        assert_eq!(res.values["S"], "ABC");
        assert_eq!(res.values["N"], 3.5);
        assert_eq!(res.values["O"], json!({ "k": [1, 2] }));
        assert!(res.unresolved.is_empty());
    }

    #[test]
    fn null_field_value_counts_as_resolved() {
        let prior = vec![result(json!({ "FOO": null }))];
        let res = resolve(&params(&[("X", ParamExpr::reference(1, "FOO"))]), &prior);

        assert_eq!(res.values["X"], Value::Null);
        assert!(res.unresolved.is_empty());
    }
}
