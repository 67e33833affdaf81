//! Row-level evaluation of predicates and operators.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use crate::condition::Operator;
use crate::error::{lock_err, DbError, DbResult, ExecutionError};
use crate::statement::{CompareOp, Predicate};
use crate::value::{Row, Value};

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();
const REGEX_CACHE_MAX: usize = 512;

/// Compiles `pattern`, reusing earlier compilations.
pub(crate) fn cached_regex(pattern: &str) -> DbResult<Regex> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    {
        let guard = cache.read().map_err(|_| lock_err("regex cache"))?;
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    let compiled = Regex::new(pattern)
        .map_err(|e| DbError::internal(format!("invalid regex '{pattern}': {e}")))?;

    let mut guard = cache.write().map_err(|_| lock_err("regex cache"))?;
    if guard.len() >= REGEX_CACHE_MAX {
        guard.clear();
    }
    guard.insert(pattern.to_string(), compiled.clone());
    Ok(compiled)
}

/// Translates a SQL `LIKE` pattern: `%` is any run, `_` exactly one
/// character, everything else literal. The match is anchored.
pub(crate) fn like_to_regex(pattern: &str, case_sensitive: bool) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str(if case_sensitive { "(?s)^" } else { "(?is)^" });
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

pub(crate) fn like_matches(pattern: &str, text: &str, case_sensitive: bool) -> DbResult<bool> {
    Ok(cached_regex(&like_to_regex(pattern, case_sensitive))?.is_match(text))
}

/// Text a value is matched against by `LIKE`.
fn like_subject(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s.clone()),
        other => Some(other.key_string()),
    }
}

fn ordered(actual: &Value, operand: &Value, accept: impl Fn(CmpOrdering) -> bool) -> bool {
    actual.compare(operand).is_some_and(accept)
}

/// Applies one comparison to a field value.
pub(crate) fn compare(op: CompareOp, actual: &Value, operand: &Value, case_sensitive: bool) -> DbResult<bool> {
    Ok(match op {
        CompareOp::Eq => actual.loose_eq(operand),
        CompareOp::NotEq => !actual.loose_eq(operand),
        CompareOp::Gt => ordered(actual, operand, CmpOrdering::is_gt),
        CompareOp::Gte => ordered(actual, operand, CmpOrdering::is_ge),
        CompareOp::Lt => ordered(actual, operand, CmpOrdering::is_lt),
        CompareOp::Lte => ordered(actual, operand, CmpOrdering::is_le),
        CompareOp::Like | CompareOp::NotLike => {
            let (Some(text), Some(pattern)) = (like_subject(actual), like_subject(operand)) else {
                return Ok(false);
            };
            like_matches(&pattern, &text, case_sensitive)? == (op == CompareOp::Like)
        }
        CompareOp::In | CompareOp::NotIn => {
            let items = operand.as_list().ok_or_else(|| ExecutionError::NotAnArray {
                context: op.sql().to_string(),
            })?;
            items.iter().any(|item| actual.loose_eq(item)) == (op == CompareOp::In)
        }
    })
}

/// Applies one condition operator to a field value.
pub(crate) fn operator_matches(
    op: Operator,
    actual: &Value,
    operand: &Value,
    case_sensitive: bool,
) -> DbResult<bool> {
    let op = match op {
        Operator::Eq => CompareOp::Eq,
        Operator::Ne => CompareOp::NotEq,
        Operator::Gt => CompareOp::Gt,
        Operator::Gte => CompareOp::Gte,
        Operator::Lt => CompareOp::Lt,
        Operator::Lte => CompareOp::Lte,
        Operator::In => CompareOp::In,
        Operator::Nin => CompareOp::NotIn,
        Operator::Like => CompareOp::Like,
        Operator::Nlike => CompareOp::NotLike,
    };
    compare(op, actual, operand, case_sensitive)
}

/// Evaluates `predicate` against `row`. Missing columns read as `NULL`.
pub(crate) fn matches(predicate: &Predicate, row: &Row, params: &[Value], case_sensitive: bool) -> DbResult<bool> {
    let field = |column: &str| row.get(column).cloned().unwrap_or(Value::Null);

    Ok(match predicate {
        Predicate::Compare { column, op, value } => {
            compare(*op, &field(column), &value.resolve(params)?, case_sensitive)?
        }
        Predicate::IsNull { column, negated } => field(column).is_null() != *negated,
        Predicate::Between {
            column,
            low,
            high,
            negated,
        } => {
            let actual = field(column);
            if actual.is_null() {
                return Ok(false);
            }
            let inside = ordered(&actual, &low.resolve(params)?, CmpOrdering::is_ge)
                && ordered(&actual, &high.resolve(params)?, CmpOrdering::is_le);
            inside != *negated
        }
        Predicate::And(parts) => {
            for part in parts {
                if !matches(part, row, params, case_sensitive)? {
                    return Ok(false);
                }
            }
            true
        }
        Predicate::Or(parts) => {
            for part in parts {
                if matches(part, row, params, case_sensitive)? {
                    return Ok(true);
                }
            }
            false
        }
        Predicate::Not(inner) => !matches(inner, row, params, case_sensitive)?,
        Predicate::Literal(truth) => *truth,
    })
}

/// Columns a predicate reads.
pub(crate) fn referenced_columns<'a>(predicate: &'a Predicate, out: &mut Vec<&'a str>) {
    match predicate {
        Predicate::Compare { column, .. }
        | Predicate::IsNull { column, .. }
        | Predicate::Between { column, .. } => out.push(column),
        Predicate::And(parts) | Predicate::Or(parts) => {
            for part in parts {
                referenced_columns(part, out);
            }
        }
        Predicate::Not(inner) => referenced_columns(inner, out),
        Predicate::Literal(_) => {}
    }
}
