//! Compiler: lowers the parsed AST into the executable [`Policy`] form.

use serde_json::{Number, Value};

use crate::ast::{ActionDecl, CmpOpAst, Expr, PolicyFileAst, RuleDecl};
use crate::error::{DslError, DslResult};
use crate::policy::{
    Action, ActionKind, CmpOp, CompiledRule, Condition, DefaultDecision, Defaults, Policy,
};

/// Compile a parsed file into a named policy.
pub fn compile(name: &str, file: &PolicyFileAst) -> DslResult<Policy> {
    let mut rules = Vec::with_capacity(file.rules.len());
    for decl in &file.rules {
        rules.push(compile_rule(decl)?);
    }

    let defaults = match &file.defaults {
        None => Defaults::default(),
        Some(decl) => {
            let decision = match decl.decision.as_deref() {
                None => DefaultDecision::default(),
                Some(s) => DefaultDecision::parse(s).ok_or_else(|| {
                    DslError::Compile(format!(
                        "unknown default decision {s:?}; valid: approve|require_review|reject"
                    ))
                })?,
            };
            Defaults {
                decision,
                required_approvers: decl.required_approvers.unwrap_or(1),
            }
        }
    };

    Ok(Policy { name: name.to_string(), rules, defaults })
}

fn compile_rule(decl: &RuleDecl) -> DslResult<CompiledRule> {
    let id = rule_id(&decl.name);
    if id.is_empty() {
        return Err(DslError::Compile(format!("rule name {:?} produces an empty id", decl.name)));
    }

    let conditions = match compile_expr(&decl.when)? {
        Condition::All(list) => list,
        single => vec![single],
    };

    let mut actions = Vec::with_capacity(decl.actions.len());
    for a in &decl.actions {
        actions.push(compile_action(a)?);
    }

    Ok(CompiledRule {
        id,
        name: decl.name.clone(),
        priority: decl.priority,
        description: decl.description.clone(),
        enabled: decl.enabled,
        conditions,
        actions,
    })
}

/// Rule name → id: lowercase with `-` and spaces replaced by `_`.
fn rule_id(name: &str) -> String {
    name.to_lowercase().replace(['-', ' '], "_")
}

fn compile_expr(expr: &Expr) -> DslResult<Condition> {
    match expr {
        Expr::Bool(true) => Ok(Condition::Always),
        Expr::Bool(false) => Ok(Condition::Not(Box::new(Condition::Always))),
        Expr::And(left, right) => {
            // Flatten nested conjunctions into one sequential list.
            let mut list = Vec::new();
            for side in [left.as_ref(), right.as_ref()] {
                match compile_expr(side)? {
                    Condition::All(inner) => list.extend(inner),
                    other => list.push(other),
                }
            }
            Ok(Condition::All(list))
        }
        Expr::Or(left, right) => {
            Ok(Condition::Any(vec![compile_expr(left)?, compile_expr(right)?]))
        }
        Expr::Not(inner) => Ok(Condition::Not(Box::new(compile_expr(inner)?))),
        Expr::Compare { op, left, right } => compile_comparison(*op, left, right),
        Expr::Ident(name) => Err(DslError::Compile(format!(
            "bare identifier {name:?} is not a condition; compare it to a value"
        ))),
        Expr::Str(_) | Expr::Num(_) | Expr::List(_) => {
            Err(DslError::Compile("literal is not a condition".into()))
        }
    }
}

fn compile_comparison(op: CmpOpAst, left: &Expr, right: &Expr) -> DslResult<Condition> {
    let field = match left {
        Expr::Ident(name) => name.clone(),
        other => {
            return Err(DslError::Compile(format!(
                "left side of a comparison must be a context path, found {other:?}"
            )))
        }
    };
    let op = lower_op(op);
    let value = literal_value(right)?;
    if op == CmpOp::In && !value.is_array() {
        return Err(DslError::Compile(format!("'in' on {field:?} requires a list value")));
    }
    Ok(Condition::Leaf { field, op, value })
}

const fn lower_op(op: CmpOpAst) -> CmpOp {
    match op {
        CmpOpAst::Eq => CmpOp::Eq,
        CmpOpAst::Ne => CmpOp::Ne,
        CmpOpAst::Gt => CmpOp::Gt,
        CmpOpAst::Lt => CmpOp::Lt,
        CmpOpAst::Ge => CmpOp::Gte,
        CmpOpAst::Le => CmpOp::Lte,
        CmpOpAst::In => CmpOp::In,
        CmpOpAst::Contains => CmpOp::Contains,
        CmpOpAst::Matches => CmpOp::Matches,
    }
}

fn literal_value(expr: &Expr) -> DslResult<Value> {
    match expr {
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Num(n) => Ok(Number::from_f64(*n).map_or(Value::Null, Value::Number)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(literal_value(item)?);
            }
            Ok(Value::Array(out))
        }
        // Paths on the right would make conditions relational; the language
        // compares against literals only.
        other => Err(DslError::Compile(format!(
            "right side of a comparison must be a literal, found {other:?}"
        ))),
    }
}

fn compile_action(decl: &ActionDecl) -> DslResult<Action> {
    let kind = ActionKind::from_name(&decl.name).ok_or_else(|| {
        DslError::Compile(format!("unknown action {:?} at line {}", decl.name, decl.line))
    })?;
    let mut params = serde_json::Map::new();
    for (key, value) in &decl.args {
        params.insert(key.clone(), value.clone());
    }
    Ok(Action { kind, params })
}
