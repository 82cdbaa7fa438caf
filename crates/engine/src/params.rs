//! Step parameter expressions.
//!
//! On the wire a parameter value is either a literal JSON value or a string
//! of the form `"<step>.<field>"` pointing at a field of an earlier step's
//! result. The string form is parsed once, when the interface is loaded.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

static BACK_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)\.([A-Za-z0-9_]+)$").expect("back-reference regex is valid"));

/// Key of the escape object used for literal strings that look like
/// back-references.
const LITERAL_KEY: &str = "literal";

#[derive(Debug, Clone, PartialEq)]
pub enum ParamExpr {
    /// Passed to the adapter unchanged.
    Literal(Value),
    /// Field `field` of the result of step `step` (1-based).
    StepReference { step: usize, field: String },
}

impl ParamExpr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(step: usize, field: impl Into<String>) -> Self {
        Self::StepReference { step, field: field.into() }
    }

    /// Interpret a wire value: strings matching `<digits>.<identifier>` are
    /// back-references, everything else is a literal.
    pub fn parse(value: Value) -> Self {
        if let Value::String(s) = &value {
            if let Some(caps) = BACK_REFERENCE.captures(s) {
                return Self::StepReference {
                    // Absurdly large indices can never resolve; keep them as
                    // references so they warn instead of silently passing.
                    step: caps[1].parse().unwrap_or(usize::MAX),
                    field: caps[2].to_string(),
                };
            }
        }
        Self::Literal(value)
    }

    /// Wire form of this expression. Literal strings that would parse back as
    /// a reference are wrapped as `{"literal": "..."}`.
    pub fn to_wire(&self) -> Value {
        match self {
            Self::StepReference { step, field } => Value::String(format!("{step}.{field}")),
            Self::Literal(Value::String(s)) if BACK_REFERENCE.is_match(s) => {
                let mut escaped = Map::new();
                escaped.insert(LITERAL_KEY.to_string(), Value::String(s.clone()));
                Value::Object(escaped)
            }
            Self::Literal(v) => v.clone(),
        }
    }
}

impl fmt::Display for ParamExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepReference { step, field } => write!(f, "{step}.{field}"),
            Self::Literal(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for ParamExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ParamExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if let Value::Object(obj) = &value {
            if obj.len() == 1 {
                if let Some(inner) = obj.get(LITERAL_KEY) {
                    return Ok(Self::Literal(inner.clone()));
                }
            }
        }
        Ok(Self::parse(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digit_dot_identifier_is_a_reference() {
        assert_eq!(ParamExpr::parse(json!("1.FOO")), ParamExpr::reference(1, "FOO"));
        assert_eq!(ParamExpr::parse(json!("12.customer_id")), ParamExpr::reference(12, "customer_id"));
    }

    #[test]
    fn plain_strings_are_literals() {
        assert_eq!(ParamExpr::parse(json!("ABC")), ParamExpr::literal("ABC"));
    }

    #[test]
    fn strings_with_dots_that_do_not_match_fully_are_literals() {
        for s in ["1.5.2", "v1.FOO", "1.FOO BAR", "1.", ".FOO", "1.FOO-BAR", " 1.FOO"] {
            assert_eq!(ParamExpr::parse(json!(s)), ParamExpr::literal(s), "{s}");
        }
    }

    #[test]
    fn non_string_values_are_literals() {
        assert_eq!(ParamExpr::parse(json!(1.5)), ParamExpr::literal(1.5));
        assert_eq!(ParamExpr::parse(json!(null)), ParamExpr::Literal(Value::Null));
        assert_eq!(ParamExpr::parse(json!(true)), ParamExpr::literal(true));
    }

    #[test]
    fn deserialization_parses_legacy_strings() {
        let params: std::collections::BTreeMap<String, ParamExpr> =
            serde_json::from_value(json!({ "X": "1.FOO", "Y": "ABC", "Z": 3 })).unwrap();

        assert_eq!(params["X"], ParamExpr::reference(1, "FOO"));
        assert_eq!(params["Y"], ParamExpr::literal("ABC"));
        assert_eq!(params["Z"], ParamExpr::literal(3));
    }

    #[test]
    fn reference_shaped_literal_survives_a_save_and_reload() {
        let original = ParamExpr::literal("1.FOO");
        let wire = serde_json::to_value(&original).unwrap();
        assert_eq!(wire, json!({ "literal": "1.FOO" }));

        let reloaded: ParamExpr = serde_json::from_value(wire).unwrap();
        assert_eq!(reloaded, original);
    }

    #[test]
    fn references_serialize_in_legacy_form() {
        let wire = serde_json::to_value(ParamExpr::reference(2, "ROWS")).unwrap();
        assert_eq!(wire, json!("2.ROWS"));
    }
}
