//! Document compiler: `QueryParams` to [`DocumentQuery`].

use serde::Serialize;

use crate::column::TableSchema;
use crate::condition::{Clause, Condition, FieldCondition, Operator};
use crate::error::{DbResult, ExecutionError};
use crate::query::{Alteration, BuildQueryResult, Ordering, QueryParams};
use crate::value::{Row, Value};

use super::{Paradigm, ParadigmKind};

/// Collection-oriented paradigm. Queries compile to [`DocumentQuery`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Document;

/// A compiled filter over documents.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentFilter {
    /// Matches every document.
    All,
    /// Operators applied to one field.
    Field {
        field: String,
        ops: Vec<(Operator, Value)>,
    },
    /// `$and`
    And(Vec<DocumentFilter>),
    /// `$or`
    Or(Vec<DocumentFilter>),
    /// `$not`
    Not(Box<DocumentFilter>),
}

impl DocumentFilter {
    /// Compiles a condition. Bare values become `$eq`.
    pub fn compile(condition: &Condition) -> DbResult<Self> {
        let mut parts = condition
            .clauses()
            .iter()
            .map(Self::clause)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(match parts.len() {
            0 => Self::All,
            1 => parts.remove(0),
            _ => Self::And(parts),
        })
    }

    fn clause(clause: &Clause) -> DbResult<Self> {
        Ok(match clause {
            Clause::Field { field, condition } => {
                let ops = match condition {
                    FieldCondition::Value(value) => vec![(Operator::Eq, value.clone())],
                    FieldCondition::Operators(ops) => ops.clone(),
                };
                for (op, value) in &ops {
                    if op.takes_list() && value.as_list().is_none() {
                        return Err(ExecutionError::NotAnArray {
                            context: format!("{field} {}", op.key()),
                        }
                        .into());
                    }
                }
                Self::Field {
                    field: field.clone(),
                    ops,
                }
            }
            Clause::And(subs) => Self::And(subs.iter().map(Self::compile).collect::<DbResult<_>>()?),
            Clause::Or(subs) => Self::Or(subs.iter().map(Self::compile).collect::<DbResult<_>>()?),
            Clause::Not(sub) => Self::Not(Box::new(Self::compile(sub)?)),
        })
    }

    /// Mongo-style JSON rendering.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Map, Value as J};

        match self {
            Self::All => J::Object(Map::new()),
            Self::Field { field, ops } => {
                let ops: Map<String, J> = ops
                    .iter()
                    .map(|(op, v)| (op.key().to_string(), v.to_json()))
                    .collect();
                json!({ field.as_str(): ops })
            }
            Self::And(parts) => json!({ "$and": parts.iter().map(Self::to_json).collect::<Vec<_>>() }),
            Self::Or(parts) => json!({ "$or": parts.iter().map(Self::to_json).collect::<Vec<_>>() }),
            Self::Not(inner) => json!({ "$not": inner.to_json() }),
        }
    }
}

impl Serialize for DocumentFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// What to do with one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DocumentOperation {
    /// Provision a collection.
    CreateCollection {
        schema: TableSchema,
    },
    /// Query documents.
    Find {
        filter: DocumentFilter,
        projection: Vec<String>,
        sort: Vec<Ordering>,
        group_by: Vec<String>,
        skip: Option<u64>,
        limit: Option<u64>,
    },
    /// Insert one document.
    InsertOne {
        document: Row,
    },
    /// Set fields on matching documents.
    UpdateMany {
        filter: DocumentFilter,
        set: Row,
    },
    /// Remove matching documents.
    DeleteMany {
        filter: DocumentFilter,
    },
    /// Apply schema changes to stored documents.
    Alter {
        alterations: Vec<Alteration>,
    },
    /// Remove the collection.
    DropCollection,
    /// Create a field index.
    CreateIndex {
        name: String,
        fields: Vec<String>,
        unique: bool,
    },
    /// Drop an index.
    DropIndex {
        name: String,
    },
}

/// A compiled document query. Values are carried inline, so nothing is
/// bound positionally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentQuery {
    /// Target collection.
    pub collection: String,
    /// Operation to run.
    pub operation: DocumentOperation,
}

impl Paradigm for Document {
    type Query = DocumentQuery;

    const KIND: ParadigmKind = ParadigmKind::Document;
    const EAGER_PROVISIONING: bool = false;

    fn build_query(params: &QueryParams) -> DbResult<BuildQueryResult<DocumentQuery>> {
        let filter = |c: Option<&Condition>| c.map_or(Ok(DocumentFilter::All), DocumentFilter::compile);

        let operation = match params {
            QueryParams::Create { schema, .. } => DocumentOperation::CreateCollection {
                schema: schema.clone(),
            },
            QueryParams::Select(select) => DocumentOperation::Find {
                filter: filter(select.conditions.as_ref())?,
                projection: select.fields.clone().unwrap_or_default(),
                sort: select.orderings.clone(),
                group_by: select.groupings.clone(),
                skip: select.offset_count,
                limit: select.limit_count,
            },
            QueryParams::Insert { data, .. } => DocumentOperation::InsertOne {
                document: data.clone(),
            },
            QueryParams::Update {
                update, conditions, ..
            } => DocumentOperation::UpdateMany {
                filter: filter(conditions.as_ref())?,
                set: update.clone(),
            },
            QueryParams::Delete { conditions, .. } => DocumentOperation::DeleteMany {
                filter: filter(conditions.as_ref())?,
            },
            QueryParams::Alter { alterations, .. } => DocumentOperation::Alter {
                alterations: alterations.clone(),
            },
            QueryParams::DropTable { .. } => DocumentOperation::DropCollection,
            QueryParams::DropIndex { index_name, .. } => DocumentOperation::DropIndex {
                name: index_name.clone(),
            },
            QueryParams::CreateIndex {
                index_name,
                columns,
                unique,
                ..
            } => DocumentOperation::CreateIndex {
                name: index_name.clone(),
                fields: columns.clone(),
                unique: *unique,
            },
        };

        Ok(BuildQueryResult::unbound(DocumentQuery {
            collection: params.table_name().to_string(),
            operation,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SelectParams;
    use crate::row;

    #[test]
    fn test_bare_value_becomes_eq() {
        let filter = DocumentFilter::compile(&Condition::new().eq("name", "ada")).unwrap();
        assert_eq!(filter.to_json(), serde_json::json!({"name": {"$eq": "ada"}}));
    }

    #[test]
    fn test_logical_keys_map_directly() {
        let cond = Condition::new()
            .or(vec![Condition::new().eq("a", 1), Condition::new().gt("b", 2)])
            .not(Condition::new().eq("c", true));
        let filter = DocumentFilter::compile(&cond).unwrap();
        assert_eq!(
            filter.to_json(),
            serde_json::json!({"$and": [
                {"$or": [{"a": {"$eq": 1}}, {"b": {"$gt": 2}}]},
                {"$not": {"c": {"$eq": true}}}
            ]})
        );
    }

    #[test]
    fn test_empty_condition_matches_all() {
        assert_eq!(DocumentFilter::compile(&Condition::new()).unwrap(), DocumentFilter::All);
    }

    #[test]
    fn test_in_requires_list() {
        let cond = Condition::new().op("tags", Operator::Nin, "x");
        assert!(DocumentFilter::compile(&cond).is_err());
    }

    #[test]
    fn test_build_find_and_insert() {
        let built = Document::build_query(
            &SelectParams::new("posts")
                .conditions(Condition::new().eq("draft", false))
                .fields(["title"])
                .limit(2)
                .into(),
        )
        .unwrap();
        assert!(built.params.is_empty());
        assert_eq!(built.query.collection, "posts");
        let DocumentOperation::Find { projection, limit, .. } = &built.query.operation else {
            panic!("expected find");
        };
        assert_eq!(projection, &vec!["title".to_string()]);
        assert_eq!(*limit, Some(2));

        let built = Document::build_query(&QueryParams::Insert {
            table_name: "posts".into(),
            data: row! { "title" => "hello" },
        })
        .unwrap();
        assert!(matches!(built.query.operation, DocumentOperation::InsertOne { .. }));
    }
}
