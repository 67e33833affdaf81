//! Dialect-agnostic filter conditions.
//!
//! A [`Condition`] is a conjunction of clauses. Each clause either
//! constrains one field (with a bare value meaning equality, or a set of
//! operators) or combines nested conditions with `$and`, `$or` or `$not`.
//!
//! Conditions can be built fluently or parsed from their JSON form:
//!
//! ```
//! use dialectdb::Condition;
//!
//! let fluent = Condition::new()
//!     .gt("age", 18)
//!     .or(vec![Condition::new().eq("role", "admin"), Condition::new().eq("role", "owner")]);
//!
//! let parsed = Condition::from_json(&serde_json::json!({
//!     "age": {"$gt": 18},
//!     "$or": [{"role": "admin"}, {"role": "owner"}]
//! }))
//! .unwrap();
//!
//! assert_eq!(fluent, parsed);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DbResult, SyntaxError};
use crate::value::Value;

/// Field operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `$eq`
    Eq,
    /// `$ne`
    Ne,
    /// `$gt`
    Gt,
    /// `$gte`
    Gte,
    /// `$lt`
    Lt,
    /// `$lte`
    Lte,
    /// `$in`
    In,
    /// `$nin`
    Nin,
    /// `$like`
    Like,
    /// `$nlike`
    Nlike,
}

impl Operator {
    /// All operators, in canonical order.
    pub const ALL: [Self; 10] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::Nin,
        Self::Like,
        Self::Nlike,
    ];

    /// The `$`-prefixed key used in the JSON form.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::Like => "$like",
            Self::Nlike => "$nlike",
        }
    }

    /// Parses a `$`-prefixed operator key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.key() == key)
    }

    /// True for operators whose operand is a list.
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }
}

/// Constraint on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    /// Bare literal, meaning equality.
    Value(Value),
    /// One entry per operator key, in insertion order.
    Operators(Vec<(Operator, Value)>),
}

/// One key of a condition object.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Constraint on one field.
    Field {
        field: String,
        condition: FieldCondition,
    },
    /// `$and`
    And(Vec<Condition>),
    /// `$or`
    Or(Vec<Condition>),
    /// `$not`
    Not(Box<Condition>),
}

/// Conjunction of clauses. The empty condition matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    clauses: Vec<Clause>,
}

impl Condition {
    /// The empty condition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clauses in insertion order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// True when the condition matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Bare equality: `{field: value}`.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Field {
            field: field.into(),
            condition: FieldCondition::Value(value.into()),
        });
        self
    }

    /// Adds `operator` to the operator set of `field`, creating the set if
    /// needed. A repeated operator replaces the earlier operand.
    #[must_use]
    pub fn op(mut self, field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        let existing = self.clauses.iter_mut().find_map(|c| match c {
            Clause::Field {
                field: f,
                condition: FieldCondition::Operators(ops),
            } if *f == field => Some(ops),
            _ => None,
        });
        match existing {
            Some(ops) => match ops.iter_mut().find(|(o, _)| *o == operator) {
                Some(slot) => slot.1 = value,
                None => ops.push((operator, value)),
            },
            None => self.clauses.push(Clause::Field {
                field,
                condition: FieldCondition::Operators(vec![(operator, value)]),
            }),
        }
        self
    }

    /// `field != value`.
    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Ne, value)
    }

    /// `field > value`.
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gt, value)
    }

    /// `field >= value`.
    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gte, value)
    }

    /// `field < value`.
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lt, value)
    }

    /// `field <= value`.
    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lte, value)
    }

    /// `field` is one of `values`.
    #[must_use]
    pub fn is_in<T: Into<Value>>(self, field: impl Into<String>, values: Vec<T>) -> Self {
        self.op(field, Operator::In, Value::from(values))
    }

    /// `field` is none of `values`.
    #[must_use]
    pub fn not_in<T: Into<Value>>(self, field: impl Into<String>, values: Vec<T>) -> Self {
        self.op(field, Operator::Nin, Value::from(values))
    }

    /// SQL `LIKE` with `%` and `_` wildcards.
    #[must_use]
    pub fn like(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.op(field, Operator::Like, Value::Text(pattern.into()))
    }

    /// Negated `like`.
    #[must_use]
    pub fn not_like(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.op(field, Operator::Nlike, Value::Text(pattern.into()))
    }

    /// `$and` over sub-conditions.
    #[must_use]
    pub fn and(mut self, conditions: Vec<Condition>) -> Self {
        self.clauses.push(Clause::And(conditions));
        self
    }

    /// `$or` over sub-conditions.
    #[must_use]
    pub fn or(mut self, conditions: Vec<Condition>) -> Self {
        self.clauses.push(Clause::Or(conditions));
        self
    }

    /// `$not` of a sub-condition.
    #[must_use]
    pub fn not(mut self, condition: Condition) -> Self {
        self.clauses.push(Clause::Not(Box::new(condition)));
        self
    }

    /// Parses the JSON object form.
    ///
    /// Keys other than `$and`, `$or` and `$not` name fields. A field whose
    /// value is an object with only `$`-prefixed keys is an operator set;
    /// any other value is a bare literal.
    pub fn from_json(json: &serde_json::Value) -> DbResult<Self> {
        let serde_json::Value::Object(map) = json else {
            return Err(malformed("condition must be an object"));
        };

        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            let clause = match key.as_str() {
                "$and" => Clause::And(parse_list(key, value)?),
                "$or" => Clause::Or(parse_list(key, value)?),
                "$not" => Clause::Not(Box::new(Self::from_json(value)?)),
                k if k.starts_with('$') => {
                    return Err(SyntaxError::UnknownOperator {
                        operator: k.to_string(),
                    }
                    .into())
                }
                field => Clause::Field {
                    field: field.to_string(),
                    condition: parse_field(value)?,
                },
            };
            clauses.push(clause);
        }
        Ok(Self { clauses })
    }

    /// Renders the JSON object form. Inverse of [`Condition::from_json`].
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for clause in &self.clauses {
            match clause {
                Clause::Field { field, condition } => {
                    let value = match condition {
                        FieldCondition::Value(v) => v.to_json(),
                        FieldCondition::Operators(ops) => serde_json::Value::Object(
                            ops.iter()
                                .map(|(op, v)| (op.key().to_string(), v.to_json()))
                                .collect(),
                        ),
                    };
                    map.insert(field.clone(), value);
                }
                Clause::And(subs) => {
                    map.insert("$and".into(), subs.iter().map(Self::to_json).collect());
                }
                Clause::Or(subs) => {
                    map.insert("$or".into(), subs.iter().map(Self::to_json).collect());
                }
                Clause::Not(sub) => {
                    map.insert("$not".into(), sub.to_json());
                }
            }
        }
        serde_json::Value::Object(map)
    }
}

fn malformed(reason: impl Into<String>) -> crate::error::DbError {
    SyntaxError::MalformedCondition {
        reason: reason.into(),
    }
    .into()
}

fn parse_list(key: &str, value: &serde_json::Value) -> DbResult<Vec<Condition>> {
    let serde_json::Value::Array(items) = value else {
        return Err(malformed(format!("{key} expects an array of conditions")));
    };
    items.iter().map(Condition::from_json).collect()
}

fn parse_field(value: &serde_json::Value) -> DbResult<FieldCondition> {
    let serde_json::Value::Object(map) = value else {
        return Ok(FieldCondition::Value(Value::from_json(value.clone())));
    };
    if map.is_empty() || !map.keys().all(|k| k.starts_with('$')) {
        return Ok(FieldCondition::Value(Value::from_json(value.clone())));
    }

    let mut ops = Vec::with_capacity(map.len());
    for (key, operand) in map {
        let op = Operator::from_key(key).ok_or_else(|| SyntaxError::UnknownOperator {
            operator: key.clone(),
        })?;
        ops.push((op, Value::from_json(operand.clone())));
    }
    Ok(FieldCondition::Operators(ops))
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_keys_roundtrip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_key(op.key()), Some(op));
        }
        assert_eq!(Operator::from_key("$regex"), None);
    }

    #[test]
    fn test_op_merges_into_one_field_clause() {
        let c = Condition::new().gte("age", 18).lt("age", 65);
        assert_eq!(c.clauses().len(), 1);
        let Clause::Field {
            condition: FieldCondition::Operators(ops),
            ..
        } = &c.clauses()[0]
        else {
            panic!("expected operator set");
        };
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn test_from_json_bare_and_operators() {
        let c = Condition::from_json(&serde_json::json!({
            "name": "ada",
            "age": {"$gte": 18, "$in": [18, 19]},
        }))
        .unwrap();
        assert_eq!(c.clauses().len(), 2);
        assert_eq!(c, Condition::new().eq("name", "ada").gte("age", 18).is_in("age", vec![18, 19]));
    }

    #[test]
    fn test_from_json_plain_object_is_literal() {
        let c = Condition::from_json(&serde_json::json!({"meta": {"a": 1}})).unwrap();
        assert!(matches!(
            &c.clauses()[0],
            Clause::Field {
                condition: FieldCondition::Value(Value::Json(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_from_json_rejects_unknown_operator() {
        let err = Condition::from_json(&serde_json::json!({"a": {"$regex": "x"}})).unwrap_err();
        assert!(err.to_string().contains("$regex"));

        let err = Condition::from_json(&serde_json::json!({"$xor": []})).unwrap_err();
        assert!(err.is_syntax());

        assert!(Condition::from_json(&serde_json::json!({"$and": {}})).is_err());
        assert!(Condition::from_json(&serde_json::json!([1])).is_err());
    }

    #[test]
    fn test_logical_clauses() {
        let c = Condition::from_json(&serde_json::json!({
            "$not": {"status": "banned"},
            "$and": [{"a": 1}, {"b": {"$ne": 2}}],
        }))
        .unwrap();
        assert_eq!(c.clauses().len(), 2);
        assert!(c.clauses().iter().any(|cl| matches!(cl, Clause::Not(_))));
        assert!(c.clauses().iter().any(|cl| matches!(cl, Clause::And(v) if v.len() == 2)));
    }

    #[test]
    fn test_serde_uses_json_form() {
        let c = Condition::new().eq("id", 3).not_like("email", "%@spam.io");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json, serde_json::json!({"id": 3, "email": {"$nlike": "%@spam.io"}}));

        let back: Condition = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
