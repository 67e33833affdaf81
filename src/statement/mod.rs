//! Structured relational statements.
//!
//! The relational compiler produces a [`Statement`] rather than SQL text.
//! The memory engine interprets statements directly; SQL-speaking dialects
//! render them with [`Statement::to_sql`] using their own
//! [`SqlFormatter`](crate::dialect::SqlFormatter) tokens.
//!
//! Values never travel inside the statement as text. They are either
//! literals carried as typed [`Value`]s or [`Operand::Param`] references
//! into the positional parameter list bound at execution time.

mod render;

use serde::{Deserialize, Serialize};

use crate::column::ColumnDef;
use crate::error::{DbResult, ExecutionError};
use crate::query::{Alteration, Ordering};
use crate::value::Value;

/// A value slot inside a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    /// Zero-based index into the bound parameters.
    Param(usize),
    /// Inline value.
    Literal(Value),
    /// Parenthesized list.
    List(Vec<Operand>),
}

impl Operand {
    /// Resolves this operand against the bound parameters.
    pub fn resolve(&self, params: &[Value]) -> DbResult<Value> {
        match self {
            Self::Param(index) => params
                .get(*index)
                .cloned()
                .ok_or_else(|| ExecutionError::MissingParameter { index: *index }.into()),
            Self::Literal(value) => Ok(value.clone()),
            Self::List(items) => items
                .iter()
                .map(|item| item.resolve(params))
                .collect::<DbResult<Vec<_>>>()
                .map(Value::List),
        }
    }
}

/// Binary comparison operators of a `WHERE` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
}

impl CompareOp {
    /// SQL spelling.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// Parses a symbolic operator token. `<>` is accepted for `!=`.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::NotEq,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            _ => return None,
        })
    }
}

/// A boolean expression over the columns of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// `column op value`.
    Compare {
        column: String,
        op: CompareOp,
        value: Operand,
    },
    /// `IS [NOT] NULL`.
    IsNull {
        column: String,
        negated: bool,
    },
    /// `[NOT] BETWEEN low AND high`, inclusive.
    Between {
        column: String,
        low: Operand,
        high: Operand,
        negated: bool,
    },
    /// Conjunction.
    And(Vec<Predicate>),
    /// Disjunction.
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
    /// Constant truth value, rendered as `1=1` or `1=0`.
    Literal(bool),
}

impl Predicate {
    /// A comparison predicate.
    #[must_use]
    pub fn compare(column: impl Into<String>, op: CompareOp, value: Operand) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value,
        }
    }

    /// Conjunction of `preds`, collapsing the single-element case.
    #[must_use]
    pub fn all(mut preds: Vec<Predicate>) -> Self {
        if preds.len() == 1 {
            preds.remove(0)
        } else {
            Self::And(preds)
        }
    }
}

/// A `SELECT` statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// Source table.
    pub table: String,
    /// Projected columns; empty means `*`.
    pub fields: Vec<String>,
    /// `WHERE` predicate.
    pub filter: Option<Predicate>,
    /// `GROUP BY` columns.
    pub group_by: Vec<String>,
    /// `ORDER BY` keys.
    pub order_by: Vec<Ordering>,
    /// `LIMIT`.
    pub limit: Option<u64>,
    /// `OFFSET`.
    pub offset: Option<u64>,
}

impl Select {
    /// `SELECT * FROM table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}

/// One relational statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum Statement {
    /// `CREATE TABLE`.
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
        if_not_exists: bool,
    },
    /// `CREATE [UNIQUE] INDEX`.
    CreateIndex {
        table: String,
        index: String,
        columns: Vec<String>,
        unique: bool,
        if_not_exists: bool,
    },
    /// `INSERT INTO`.
    Insert {
        table: String,
        columns: Vec<String>,
        values: Vec<Operand>,
    },
    /// `SELECT`.
    Select(Select),
    /// `UPDATE`.
    Update {
        table: String,
        assignments: Vec<(String, Operand)>,
        filter: Option<Predicate>,
    },
    /// `DELETE FROM`.
    Delete {
        table: String,
        filter: Option<Predicate>,
    },
    /// `ALTER TABLE`.
    AlterTable {
        table: String,
        alterations: Vec<Alteration>,
    },
    /// `DROP TABLE`.
    DropTable {
        table: String,
        if_exists: bool,
    },
    /// `DROP INDEX`.
    DropIndex {
        table: String,
        index: String,
        if_exists: bool,
    },
}

impl Statement {
    /// The table this statement operates on.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Select(Select { table, .. })
            | Self::CreateTable { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table, .. }
            | Self::AlterTable { table, .. }
            | Self::DropTable { table, .. }
            | Self::DropIndex { table, .. } => table,
        }
    }

    /// Leading SQL keyword(s), used in logs and error messages.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::CreateTable { .. } => "CREATE TABLE",
            Self::CreateIndex { .. } => "CREATE INDEX",
            Self::Insert { .. } => "INSERT",
            Self::Select(_) => "SELECT",
            Self::Update { .. } => "UPDATE",
            Self::Delete { .. } => "DELETE",
            Self::AlterTable { .. } => "ALTER TABLE",
            Self::DropTable { .. } => "DROP TABLE",
            Self::DropIndex { .. } => "DROP INDEX",
        }
    }

    /// True for statements that only read.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(self, Self::Select(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_resolve() {
        let params = vec![Value::Int(1), Value::from("x")];
        assert_eq!(Operand::Param(1).resolve(&params).unwrap(), Value::from("x"));
        assert_eq!(
            Operand::List(vec![Operand::Param(0), Operand::Literal(Value::Int(9))])
                .resolve(&params)
                .unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(9)])
        );
    }

    #[test]
    fn test_operand_missing_param() {
        let err = Operand::Param(3).resolve(&[]).unwrap_err();
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_compare_op_symbols() {
        assert_eq!(CompareOp::from_symbol("<>"), Some(CompareOp::NotEq));
        assert_eq!(CompareOp::from_symbol(">="), Some(CompareOp::Gte));
        assert_eq!(CompareOp::from_symbol("=>"), None);
        assert_eq!(CompareOp::NotLike.sql(), "NOT LIKE");
    }

    #[test]
    fn test_predicate_all_collapses_single() {
        let p = Predicate::compare("a", CompareOp::Eq, Operand::Param(0));
        assert_eq!(Predicate::all(vec![p.clone()]), p);
        assert!(matches!(Predicate::all(vec![p.clone(), p]), Predicate::And(v) if v.len() == 2));
    }

    #[test]
    fn test_statement_accessors() {
        let stmt = Statement::Select(Select::new("users"));
        assert_eq!(stmt.table(), "users");
        assert_eq!(stmt.keyword(), "SELECT");
        assert!(stmt.is_read());
        assert!(!Statement::DropTable {
            table: "users".into(),
            if_exists: true
        }
        .is_read());
    }
}
