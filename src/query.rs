//! Abstract query descriptions and compiled/executed results.

use serde::{Deserialize, Serialize};

use crate::column::{Column, TableSchema};
use crate::condition::Condition;
use crate::value::{Row, Value};

/// Sort direction of one ordering key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ordering {
    /// Field to sort by.
    pub field: String,
    /// Sort direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl Ordering {
    /// Ascending order on `field`.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending order on `field`.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// One schema change of an `alter` query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Alteration {
    /// Adds a column.
    Add { name: String, column: Column },
    /// Drops a column.
    Drop { name: String },
    /// Replaces a column definition.
    Modify { name: String, column: Column },
}

impl Alteration {
    /// Name of the column being changed.
    #[must_use]
    pub fn column_name(&self) -> &str {
        match self {
            Self::Add { name, .. } | Self::Drop { name } | Self::Modify { name, .. } => name,
        }
    }
}

/// Parameters of a `select` query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectParams {
    /// Table or collection to read.
    pub table_name: String,
    /// Row filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Condition>,
    /// Projected fields; `None` or empty selects every field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Sort keys, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orderings: Vec<Ordering>,
    /// Grouping fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groupings: Vec<String>,
    /// Maximum number of rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_count: Option<u64>,
    /// Rows to skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_count: Option<u64>,
}

impl SelectParams {
    /// Selects every row of `table_name`.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Sets the filter.
    #[must_use]
    pub fn conditions(mut self, conditions: Condition) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Restricts the projection.
    #[must_use]
    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Appends a sort key.
    #[must_use]
    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.orderings.push(ordering);
        self
    }

    /// Appends a grouping field.
    #[must_use]
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.groupings.push(field.into());
        self
    }

    /// Caps the row count.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit_count = Some(limit);
        self
    }

    /// Skips rows.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset_count = Some(offset);
        self
    }
}

impl From<SelectParams> for QueryParams {
    fn from(params: SelectParams) -> Self {
        Self::Select(params)
    }
}

/// One abstract database operation before compilation.
///
/// Every paradigm compiler matches this union exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryParams {
    /// Provision a table.
    Create {
        table_name: String,
        schema: TableSchema,
    },
    /// Read rows.
    Select(SelectParams),
    /// Insert one row.
    Insert {
        table_name: String,
        data: Row,
    },
    /// Update matching rows.
    Update {
        table_name: String,
        update: Row,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conditions: Option<Condition>,
    },
    /// Delete matching rows.
    Delete {
        table_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conditions: Option<Condition>,
    },
    /// Change the schema.
    Alter {
        table_name: String,
        alterations: Vec<Alteration>,
    },
    /// Drop a table.
    DropTable {
        table_name: String,
    },
    /// Drop an index.
    DropIndex {
        table_name: String,
        index_name: String,
    },
    /// Create an index.
    CreateIndex {
        table_name: String,
        index_name: String,
        columns: Vec<String>,
        #[serde(default)]
        unique: bool,
    },
}

impl QueryParams {
    /// Name of the table, collection or bucket the query targets.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::Select(SelectParams { table_name, .. })
            | Self::Create { table_name, .. }
            | Self::Insert { table_name, .. }
            | Self::Update { table_name, .. }
            | Self::Delete { table_name, .. }
            | Self::Alter { table_name, .. }
            | Self::DropTable { table_name }
            | Self::DropIndex { table_name, .. }
            | Self::CreateIndex { table_name, .. } => table_name,
        }
    }

    /// The `type` tag of this variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Select(_) => "select",
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Alter { .. } => "alter",
            Self::DropTable { .. } => "drop_table",
            Self::DropIndex { .. } => "drop_index",
            Self::CreateIndex { .. } => "create_index",
        }
    }
}

/// A compiled query plus the positional values it binds.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildQueryResult<Q> {
    /// Compiled query.
    pub query: Q,
    /// Positional parameters.
    pub params: Vec<Value>,
}

impl<Q> BuildQueryResult<Q> {
    /// Pairs a query with its parameters.
    #[must_use]
    pub const fn new(query: Q, params: Vec<Value>) -> Self {
        Self { query, params }
    }

    /// Builds a result that binds nothing.
    #[must_use]
    pub const fn unbound(query: Q) -> Self {
        Self {
            query,
            params: Vec::new(),
        }
    }
}

/// Outcome of executing one compiled query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Rows returned by reads.
    pub rows: Vec<Row>,
    /// Rows inserted, updated or deleted by writes.
    pub affected_rows: u64,
    /// Identity value generated (or supplied) by an insert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<Value>,
}

impl QueryResult {
    /// A successful statement with nothing to report.
    #[must_use]
    pub fn ack() -> Self {
        Self::default()
    }

    /// A read result.
    #[must_use]
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// A write result.
    #[must_use]
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;

    #[test]
    fn test_query_params_tagging() {
        let q = QueryParams::DropTable {
            table_name: "users".into(),
        };
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json, serde_json::json!({"type": "drop_table", "table_name": "users"}));
        assert_eq!(q.kind(), "drop_table");
        assert_eq!(q.table_name(), "users");
    }

    #[test]
    fn test_select_from_json() {
        let q: QueryParams = serde_json::from_value(serde_json::json!({
            "type": "select",
            "table_name": "users",
            "conditions": {"age": {"$gt": 30}},
            "orderings": [{"field": "name"}, {"field": "age", "direction": "desc"}],
            "limit_count": 5
        }))
        .unwrap();

        let QueryParams::Select(select) = q else {
            panic!("expected select");
        };
        assert_eq!(select.orderings[0].direction, SortDirection::Asc);
        assert_eq!(select.orderings[1], Ordering::desc("age"));
        assert_eq!(select.limit_count, Some(5));
        assert_eq!(select.conditions, Some(Condition::new().gt("age", 30)));
    }

    #[test]
    fn test_create_schema_from_json() {
        let q: QueryParams = serde_json::from_value(serde_json::json!({
            "type": "create",
            "table_name": "users",
            "schema": [
                {"name": "id", "type": "integer", "primary": true, "auto_increment": true},
                {"name": "email", "type": "text", "unique": true, "length": 120}
            ]
        }))
        .unwrap();

        let QueryParams::Create { schema, .. } = q else {
            panic!("expected create");
        };
        assert_eq!(schema.columns().len(), 2);
        assert!(schema.get("id").unwrap().auto_increment);
        assert_eq!(schema.get("email").unwrap().length, Some(120));
    }

    #[test]
    fn test_alteration_tagging() {
        let alt = Alteration::Add {
            name: "age".into(),
            column: Column::integer(),
        };
        let json = serde_json::to_value(&alt).unwrap();
        assert_eq!(json["action"], "add");
        assert_eq!(alt.column_name(), "age");
    }
}
