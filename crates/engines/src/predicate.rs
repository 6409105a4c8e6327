//! Plugin-side predicate evaluation
//!
//! Engines that filter in process (rather than translating predicates into a
//! backend query) evaluate the pushed-down [`Expr`] list with [`matches`].
//!
//! Evaluation is three-valued: a predicate is true, false, or unknown.
//! Unknown covers unsupported functions, unknown columns, NULL operands and
//! type mismatches. Only a definite `false` rejects a record, so the error
//! direction is always over-fetch; the host re-applies its own filter.
//!
//! Supported functions: `eq ne lt le gt ge and or not like in isnull`, plus
//! the value function `json_extract(doc, '$.path')`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use quarry_core::{Expr, Value};

/// A record predicates can be evaluated against
pub trait Record {
    /// Value of the named field (case-insensitive), `None` if the record
    /// has no such field
    fn field(&self, name: &str) -> Option<Value>;
}

impl Record for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Option<Value> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }
}

/// True unless some predicate is definitely false for `record`
pub fn matches<R: Record + ?Sized>(predicates: &[Expr], record: &R) -> bool {
    predicates.iter().all(|p| truth(p, record) != Some(false))
}

/// Three-valued truth of `expr`; `None` means unknown
pub fn truth<R: Record + ?Sized>(expr: &Expr, record: &R) -> Option<bool> {
    let Expr::Function { name, args } = expr else {
        return eval(expr, record).and_then(|v| v.as_bool());
    };

    match name.to_ascii_lowercase().as_str() {
        "and" => {
            let mut unknown = false;
            for arg in args {
                match truth(arg, record) {
                    Some(false) => return Some(false),
                    Some(true) => {}
                    None => unknown = true,
                }
            }
            if unknown {
                None
            } else {
                Some(true)
            }
        }
        "or" => {
            let mut unknown = false;
            for arg in args {
                match truth(arg, record) {
                    Some(true) => return Some(true),
                    Some(false) => {}
                    None => unknown = true,
                }
            }
            if unknown {
                None
            } else {
                Some(false)
            }
        }
        "not" => truth(args.first()?, record).map(|b| !b),
        "isnull" => eval(args.first()?, record).map(|v| v.is_null()),
        "like" => {
            let (value, pattern) = operands(args, record)?;
            Some(like(value.as_str()?, pattern.as_str()?))
        }
        "in" => {
            let (target, candidates) = args.split_first()?;
            let target = eval(target, record)?;
            let mut unknown = false;
            for candidate in candidates {
                match eval(candidate, record).and_then(|c| target.compare(&c)) {
                    Some(Ordering::Equal) => return Some(true),
                    Some(_) => {}
                    None => unknown = true,
                }
            }
            if unknown {
                None
            } else {
                Some(false)
            }
        }
        op @ ("eq" | "ne" | "lt" | "le" | "gt" | "ge") => {
            let (left, right) = operands(args, record)?;
            let ord = left.compare(&right)?;
            Some(match op {
                "eq" => ord == Ordering::Equal,
                "ne" => ord != Ordering::Equal,
                "lt" => ord == Ordering::Less,
                "le" => ord != Ordering::Greater,
                "gt" => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
        _ => None,
    }
}

/// Value of `expr` against `record`; `None` means unknown
pub fn eval<R: Record + ?Sized>(expr: &Expr, record: &R) -> Option<Value> {
    match expr {
        Expr::Column(name) => record.field(name),
        Expr::Literal(v) => Some(v.clone()),
        Expr::Function { args, .. } if expr.is_call_to("json_extract") => {
            let (doc, path) = operands(args, record)?;
            let doc: serde_json::Value = serde_json::from_str(doc.as_str()?).ok()?;
            json_path(&doc, path.as_str()?).map(json_to_value)
        }
        Expr::Function { .. } => truth(expr, record).map(Value::Bool),
    }
}

fn operands<R: Record + ?Sized>(args: &[Expr], record: &R) -> Option<(Value, Value)> {
    match args {
        [left, right] => Some((eval(left, record)?, eval(right, record)?)),
        _ => None,
    }
}

/// Follow a `$.a.b` / `$.list.0` path into a JSON document
pub fn json_path<'a>(doc: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let rest = path.trim().strip_prefix('$')?;
    rest.split('.')
        .filter(|seg| !seg.is_empty())
        .try_fold(doc, |node, seg| match node {
            serde_json::Value::Object(map) => map.get(seg),
            serde_json::Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Convert a JSON scalar to a [`Value`]; objects and arrays become their
/// JSON text
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// SQL `LIKE` with `%` (any run) and `_` (any one character); no escapes
pub fn like(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut vi, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while vi < v.len() {
        match p.get(pi) {
            Some('%') => {
                backtrack = Some((pi, vi));
                pi += 1;
            }
            Some(&c) if c == '_' || c == v[vi] => {
                vi += 1;
                pi += 1;
            }
            _ => match backtrack {
                Some((bp, bv)) => {
                    pi = bp + 1;
                    vi = bv + 1;
                    backtrack = Some((bp, bv + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '%')
}
