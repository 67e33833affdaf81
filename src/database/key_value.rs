//! Key-value compiler: `QueryParams` to [`KeyValueQuery`].
//!
//! Key-value backends have no condition language. Every query targets a
//! single key, extracted heuristically: a `key` field wins, then an `id`
//! field, searched through nested conditions and nested JSON objects. When
//! neither exists the query targets [`DEFAULT_KEY`]. A multi-field filter
//! therefore touches at most one entry.

use serde::Serialize;

use crate::condition::{Clause, Condition, FieldCondition, Operator};
use crate::error::DbResult;
use crate::query::{BuildQueryResult, QueryParams};
use crate::value::{Row, Value};

use super::{Paradigm, ParadigmKind};

/// Key used when no `key` or `id` can be found.
pub const DEFAULT_KEY: &str = "default";

const KEY_FIELDS: [&str; 2] = ["key", "id"];

/// Bucket-oriented paradigm. Queries compile to [`KeyValueQuery`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValue;

/// What to do with one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum KeyValueOperation {
    /// Provision a bucket.
    CreateBucket,
    /// Read one entry.
    Get {
        key: String,
        fields: Vec<String>,
    },
    /// Replaces the entry.
    Set {
        key: String,
        value: Row,
    },
    /// Merges into an existing entry.
    Merge {
        key: String,
        patch: Row,
    },
    /// Remove one entry.
    Delete {
        key: String,
    },
    /// Remove the bucket.
    DropBucket,
    /// Schema and index changes mean nothing to a key-value store.
    Noop,
}

/// A compiled key-value query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValueQuery {
    /// Target bucket.
    pub bucket: String,
    /// Operation to run.
    pub operation: KeyValueOperation,
}

impl Paradigm for KeyValue {
    type Query = KeyValueQuery;

    const KIND: ParadigmKind = ParadigmKind::KeyValue;
    const EAGER_PROVISIONING: bool = false;

    fn build_query(params: &QueryParams) -> DbResult<BuildQueryResult<KeyValueQuery>> {
        let operation = match params {
            QueryParams::Create { .. } => KeyValueOperation::CreateBucket,
            QueryParams::Select(select) => KeyValueOperation::Get {
                key: extract_key(select.conditions.as_ref(), None),
                fields: select.fields.clone().unwrap_or_default(),
            },
            QueryParams::Insert { data, .. } => KeyValueOperation::Set {
                key: extract_key(None, Some(data)),
                value: data.clone(),
            },
            QueryParams::Update {
                update, conditions, ..
            } => KeyValueOperation::Merge {
                key: extract_key(conditions.as_ref(), Some(update)),
                patch: update.clone(),
            },
            QueryParams::Delete { conditions, .. } => KeyValueOperation::Delete {
                key: extract_key(conditions.as_ref(), None),
            },
            QueryParams::DropTable { .. } => KeyValueOperation::DropBucket,
            QueryParams::Alter { .. } | QueryParams::CreateIndex { .. } | QueryParams::DropIndex { .. } => {
                KeyValueOperation::Noop
            }
        };
        Ok(BuildQueryResult::unbound(KeyValueQuery {
            bucket: params.table_name().to_string(),
            operation,
        }))
    }
}

/// Finds the key a query targets. Conditions are searched before data.
#[must_use]
pub fn extract_key(conditions: Option<&Condition>, data: Option<&Row>) -> String {
    for name in KEY_FIELDS {
        if let Some(key) = conditions.and_then(|c| key_in_condition(c, name)) {
            return key;
        }
        if let Some(key) = data.and_then(|d| key_in_row(d, name)) {
            return key;
        }
    }
    DEFAULT_KEY.to_string()
}

fn key_in_condition(condition: &Condition, name: &str) -> Option<String> {
    condition.clauses().iter().find_map(|clause| match clause {
        Clause::Field { field, condition } if field == name => match condition {
            FieldCondition::Value(value) => scalar_key(value, name),
            FieldCondition::Operators(ops) => ops
                .iter()
                .find(|(op, _)| *op == Operator::Eq)
                .and_then(|(_, value)| scalar_key(value, name)),
        },
        Clause::Field {
            condition: FieldCondition::Value(Value::Json(json)),
            ..
        } => key_in_json(json, name),
        Clause::Field { .. } => None,
        Clause::And(subs) | Clause::Or(subs) => subs.iter().find_map(|c| key_in_condition(c, name)),
        Clause::Not(_) => None,
    })
}

fn key_in_row(row: &Row, name: &str) -> Option<String> {
    if let Some(key) = row.get(name).and_then(|v| scalar_key(v, name)) {
        return Some(key);
    }
    row.values().find_map(|value| match value {
        Value::Json(json) => key_in_json(json, name),
        _ => None,
    })
}

fn key_in_json(json: &serde_json::Value, name: &str) -> Option<String> {
    let serde_json::Value::Object(map) = json else {
        return None;
    };
    if let Some(key) = map.get(name).and_then(|v| scalar_key(&Value::from_json(v.clone()), name)) {
        return Some(key);
    }
    map.values().find_map(|v| key_in_json(v, name))
}

/// Null keys and nested objects are not keys; an object under the key
/// name is searched instead.
fn scalar_key(value: &Value, name: &str) -> Option<String> {
    match value {
        Value::Null | Value::List(_) => None,
        Value::Json(json) => key_in_json(json, name),
        other => Some(other.key_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SelectParams;
    use crate::row;

    #[test]
    fn test_key_field_wins_over_id() {
        let cond = Condition::new().eq("id", 1).eq("key", "session:9");
        assert_eq!(extract_key(Some(&cond), None), "session:9");
    }

    #[test]
    fn test_id_and_operator_forms() {
        assert_eq!(extract_key(Some(&Condition::new().eq("id", 42)), None), "42");
        let cond = Condition::new().op("id", Operator::Eq, 7).gt("age", 3);
        assert_eq!(extract_key(Some(&cond), None), "7");
    }

    #[test]
    fn test_nested_conditions_and_json() {
        let cond = Condition::new().and(vec![Condition::new().eq("name", "x"), Condition::new().eq("id", 5)]);
        assert_eq!(extract_key(Some(&cond), None), "5");

        let data = row! { "meta" => serde_json::json!({"inner": {"key": "deep"}}) };
        assert_eq!(extract_key(None, Some(&data)), "deep");
    }

    #[test]
    fn test_degrades_to_default() {
        let cond = Condition::new().eq("name", "ada").gt("age", 3);
        assert_eq!(extract_key(Some(&cond), None), DEFAULT_KEY);
        assert_eq!(extract_key(None, None), DEFAULT_KEY);
    }

    #[test]
    fn test_update_falls_back_to_data_key() {
        let built = KeyValue::build_query(&QueryParams::Update {
            table_name: "cache".into(),
            update: row! { "key" => "k1", "hits" => 3 },
            conditions: None,
        })
        .unwrap();
        assert_eq!(
            built.query.operation,
            KeyValueOperation::Merge {
                key: "k1".into(),
                patch: row! { "key" => "k1", "hits" => 3 },
            }
        );
    }

    #[test]
    fn test_schema_changes_are_noops() {
        let built = KeyValue::build_query(&QueryParams::DropIndex {
            table_name: "cache".into(),
            index_name: "idx".into(),
        })
        .unwrap();
        assert_eq!(built.query.operation, KeyValueOperation::Noop);

        let built = KeyValue::build_query(&SelectParams::new("cache").into()).unwrap();
        assert_eq!(
            built.query.operation,
            KeyValueOperation::Get {
                key: DEFAULT_KEY.into(),
                fields: vec![]
            }
        );
    }
}
