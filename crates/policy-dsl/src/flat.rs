//! Flat on-disk compatibility encoding for conditions.
//!
//! Older persisted policies represent a rule's conditions as a flat list of
//! `{field, operator, value}` triples where the sentinel fields `_always`,
//! `_or`, and `_not` smuggle logical structure inside the value. New code
//! works with the [`Condition`] sum type; this module only converts at the
//! storage boundary.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{DslError, DslResult};
use crate::policy::{CmpOp, Condition};

/// Sentinel field marking an always-true condition.
pub const FIELD_ALWAYS: &str = "_always";
/// Sentinel field carrying a disjunction in its value.
pub const FIELD_OR: &str = "_or";
/// Sentinel field carrying a negated condition list in its value.
pub const FIELD_NOT: &str = "_not";

/// One flat condition triple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatCondition {
    /// Dotted path, or one of the sentinel fields.
    pub field: String,
    /// Operator short name; `or` / `not` for the structural sentinels.
    pub operator: String,
    /// Comparison value, or the serialized nested structure.
    pub value: Value,
}

/// Encode a condition list into the flat compatibility shape.
///
/// The flat list is an implicit conjunction, so `All` nodes splat into
/// their surroundings rather than encoding a sentinel of their own.
#[must_use]
pub fn to_flat(conditions: &[Condition]) -> Vec<FlatCondition> {
    let mut out = Vec::new();
    for cond in conditions {
        match cond {
            Condition::All(list) => out.extend(to_flat(list)),
            other => out.push(encode_one(other)),
        }
    }
    out
}

fn encode_one(cond: &Condition) -> FlatCondition {
    match cond {
        Condition::Always => FlatCondition {
            field: FIELD_ALWAYS.into(),
            operator: CmpOp::Eq.as_str().into(),
            value: Value::Bool(true),
        },
        Condition::Leaf { field, op, value } => FlatCondition {
            field: field.clone(),
            operator: op.as_str().into(),
            value: value.clone(),
        },
        // Unreachable through `to_flat`, which splats conjunctions; encoded
        // as a degenerate one-branch disjunction for completeness.
        Condition::All(list) => FlatCondition {
            field: FIELD_OR.into(),
            operator: "or".into(),
            value: json!({ "left": to_flat(list), "right": to_flat(list) }),
        },
        Condition::Any(branches) => {
            let (left, right) = split_branches(branches);
            FlatCondition {
                field: FIELD_OR.into(),
                operator: "or".into(),
                value: json!({ "left": to_flat(&left), "right": to_flat(&right) }),
            }
        }
        Condition::Not(inner) => FlatCondition {
            field: FIELD_NOT.into(),
            operator: "not".into(),
            value: json!(to_flat(std::slice::from_ref(inner.as_ref()))),
        },
    }
}

/// `_or` is binary on disk; three or more branches nest to the right.
fn split_branches(branches: &[Condition]) -> (Vec<Condition>, Vec<Condition>) {
    match branches {
        [] => (vec![Condition::Always], vec![Condition::Always]),
        [only] => (vec![only.clone()], vec![only.clone()]),
        [first, rest @ ..] => {
            let left = vec![first.clone()];
            let right = if rest.len() == 1 {
                vec![rest[0].clone()]
            } else {
                vec![Condition::Any(rest.to_vec())]
            };
            (left, right)
        }
    }
}

/// Decode a flat list back into the sum-typed form.
pub fn from_flat(flat: &[FlatCondition]) -> DslResult<Vec<Condition>> {
    flat.iter().map(decode_one).collect()
}

fn decode_one(fc: &FlatCondition) -> DslResult<Condition> {
    match fc.field.as_str() {
        FIELD_ALWAYS => Ok(Condition::Always),
        FIELD_OR => {
            let left = branch_list(&fc.value, "left")?;
            let right = branch_list(&fc.value, "right")?;
            Ok(Condition::Any(vec![group(left), group(right)]))
        }
        FIELD_NOT => {
            let nested: Vec<FlatCondition> = serde_json::from_value(fc.value.clone())
                .map_err(|e| DslError::Compile(format!("malformed _not value: {e}")))?;
            Ok(Condition::Not(Box::new(group(from_flat(&nested)?))))
        }
        field => {
            let op = CmpOp::parse(&fc.operator).ok_or_else(|| {
                DslError::Compile(format!("unknown operator {:?} on field {field:?}", fc.operator))
            })?;
            Ok(Condition::Leaf { field: field.into(), op, value: fc.value.clone() })
        }
    }
}

fn branch_list(value: &Value, key: &str) -> DslResult<Vec<Condition>> {
    let raw = value
        .get(key)
        .ok_or_else(|| DslError::Compile(format!("_or value is missing {key:?}")))?;
    let nested: Vec<FlatCondition> = serde_json::from_value(raw.clone())
        .map_err(|e| DslError::Compile(format!("malformed _or {key}: {e}")))?;
    from_flat(&nested)
}

fn group(mut list: Vec<Condition>) -> Condition {
    if list.len() == 1 {
        list.remove(0)
    } else {
        Condition::All(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(field: &str, op: CmpOp, value: Value) -> Condition {
        Condition::Leaf { field: field.into(), op, value }
    }

    #[test]
    fn leaves_round_trip() {
        let conds = vec![
            leaf("actor.kind", CmpOp::Eq, json!("human")),
            leaf("risk.score", CmpOp::Lt, json!(0.5)),
        ];
        let flat = to_flat(&conds);
        assert_eq!(flat[0].operator, "eq");
        assert_eq!(from_flat(&flat).unwrap(), conds);
    }

    #[test]
    fn always_uses_sentinel() {
        let flat = to_flat(&[Condition::Always]);
        assert_eq!(flat[0].field, FIELD_ALWAYS);
        assert_eq!(from_flat(&flat).unwrap(), vec![Condition::Always]);
    }

    #[test]
    fn top_level_conjunction_splats() {
        let conds = vec![Condition::All(vec![
            leaf("a", CmpOp::Eq, json!(1)),
            leaf("b", CmpOp::Eq, json!(2)),
        ])];
        let flat = to_flat(&conds);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].field, "a");
    }

    #[test]
    fn or_round_trips_left_right() {
        let conds = vec![Condition::Any(vec![
            Condition::All(vec![
                leaf("actor.kind", CmpOp::Eq, json!("ci")),
                leaf("risk.score", CmpOp::Lt, json!(0.2)),
            ]),
            leaf("actor.trustLevel", CmpOp::Eq, json!("full")),
        ])];
        let flat = to_flat(&conds);
        assert_eq!(flat[0].field, FIELD_OR);
        assert!(flat[0].value.get("left").is_some());
        let back = from_flat(&flat).unwrap();
        assert_eq!(back, conds);
    }

    #[test]
    fn not_round_trips() {
        let conds = vec![Condition::Not(Box::new(leaf("time.freeze.active", CmpOp::Eq, json!(true))))];
        let flat = to_flat(&conds);
        assert_eq!(flat[0].field, FIELD_NOT);
        assert_eq!(from_flat(&flat).unwrap(), conds);
    }

    #[test]
    fn not_over_conjunction_round_trips() {
        let conds = vec![Condition::Not(Box::new(Condition::All(vec![
            leaf("a", CmpOp::Eq, json!(1)),
            leaf("b", CmpOp::Eq, json!(2)),
        ])))];
        let flat = to_flat(&conds);
        assert_eq!(from_flat(&flat).unwrap(), conds);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let flat = vec![FlatCondition { field: "x".into(), operator: "around".into(), value: json!(1) }];
        assert!(from_flat(&flat).is_err());
    }
}
