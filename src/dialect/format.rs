//! SQL formatting primitives.
//!
//! A SQL-producing dialect decides tokens (quoting style, placeholder
//! syntax, type names, literal spelling) by implementing [`SqlFormatter`].
//! Statement shape is decided once, by the renderer in
//! [`crate::statement`], which only ever calls these primitives.
//!
//! Every method has an ANSI-flavoured default, so a dialect overrides only
//! the tokens that differ.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::column::{Column, ColumnDef, ColumnType};
use crate::error::{DbError, DbResult};
use crate::query::Alteration;
use crate::value::Value;

/// Token-level formatting rules of one SQL dialect.
pub trait SqlFormatter: Send + Sync {
    /// Type name for a column in DDL.
    fn map_column_type(&self, column: &Column) -> String {
        match (column.column_type, column.length) {
            (ColumnType::Text, Some(len)) => format!("VARCHAR({len})"),
            (ColumnType::Text, None) => "TEXT".to_string(),
            (ColumnType::Integer, _) => "INTEGER".to_string(),
            (ColumnType::Float, _) => "DOUBLE PRECISION".to_string(),
            (ColumnType::Boolean, _) => "BOOLEAN".to_string(),
            (ColumnType::Date, _) => "TIMESTAMP".to_string(),
            (ColumnType::Json, _) => "JSON".to_string(),
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Placeholder for the `position`-th bound parameter (1-based).
    fn parameter_placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    /// Keyword marking an identity column.
    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn format_boolean(&self, value: bool) -> String {
        if value { "TRUE" } else { "FALSE" }.to_string()
    }

    fn format_date(&self, value: &DateTime<Utc>) -> String {
        self.format_string(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    fn format_json(&self, value: &serde_json::Value) -> String {
        self.format_string(&value.to_string())
    }

    /// Escapes string content for use between single quotes.
    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    fn format_string(&self, value: &str) -> String {
        format!("'{}'", self.escape_string(value))
    }

    /// Literal spelling of a column default.
    fn format_default_value(&self, value: &Value) -> DbResult<String> {
        match value {
            Value::List(_) => Err(DbError::unsupported(format!(
                "default value of type {}",
                value.type_name()
            ))),
            other => self.format_literal(other),
        }
    }

    /// Literal spelling of any value. Lists render as `(a, b, ...)`.
    fn format_literal(&self, value: &Value) -> DbResult<String> {
        Ok(match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(v) => self.format_boolean(*v),
            Value::Int(v) => v.to_string(),
            Value::Float(v) if v.is_finite() => v.to_string(),
            Value::Float(v) => return Err(DbError::unsupported(format!("non-finite float {v}"))),
            Value::Text(v) => self.format_string(v),
            Value::Date(v) => self.format_date(v),
            Value::Json(v) => self.format_json(v),
            Value::List(items) => {
                let parts = items
                    .iter()
                    .map(|v| self.format_literal(v))
                    .collect::<DbResult<Vec<_>>>()?;
                format!("({})", parts.join(", "))
            }
        })
    }

    fn format_limit(&self, limit: u64) -> String {
        format!("LIMIT {limit}")
    }

    fn format_offset(&self, offset: u64) -> String {
        format!("OFFSET {offset}")
    }

    fn format_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(l), Some(o)) => format!("{} {}", self.format_limit(l), self.format_offset(o)),
            (Some(l), None) => self.format_limit(l),
            (None, Some(o)) => self.format_offset(o),
            (None, None) => String::new(),
        }
    }

    fn format_column_def(&self, def: &ColumnDef) -> DbResult<String> {
        let column = &def.column;
        let mut out = format!(
            "{} {}",
            self.quote_identifier(&def.name),
            self.map_column_type(column)
        );
        if column.primary {
            out.push_str(" PRIMARY KEY");
        }
        if column.auto_increment {
            out.push(' ');
            out.push_str(self.auto_increment_keyword());
        }
        if column.unique && !column.primary {
            out.push_str(" UNIQUE");
        }
        if !column.nullable && !column.primary {
            out.push_str(" NOT NULL");
        }
        if let Some(default) = &column.default {
            out.push_str(" DEFAULT ");
            out.push_str(&self.format_default_value(default)?);
        }
        Ok(out)
    }

    fn format_create_table(
        &self,
        table: &str,
        columns: &[ColumnDef],
        if_not_exists: bool,
    ) -> DbResult<String> {
        let defs = columns
            .iter()
            .map(|c| self.format_column_def(c))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(format!(
            "CREATE TABLE {}{} ({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.quote_identifier(table),
            defs.join(", ")
        ))
    }

    fn format_alter_table(&self, table: &str, alterations: &[Alteration]) -> DbResult<String> {
        let actions = alterations
            .iter()
            .map(|alteration| {
                Ok(match alteration {
                    Alteration::Add { name, column } => format!(
                        "ADD COLUMN {}",
                        self.format_column_def(&ColumnDef::new(name.clone(), column.clone()))?
                    ),
                    Alteration::Drop { name } => {
                        format!("DROP COLUMN {}", self.quote_identifier(name))
                    }
                    Alteration::Modify { name, column } => format!(
                        "ALTER COLUMN {} TYPE {}",
                        self.quote_identifier(name),
                        self.map_column_type(column)
                    ),
                })
            })
            .collect::<DbResult<Vec<String>>>()?;
        Ok(format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table),
            actions.join(", ")
        ))
    }

    fn format_drop_table(&self, table: &str, if_exists: bool) -> String {
        format!(
            "DROP TABLE {}{}",
            if if_exists { "IF EXISTS " } else { "" },
            self.quote_identifier(table)
        )
    }

    fn format_drop_index(&self, table: &str, index: &str, if_exists: bool) -> String {
        format!(
            "DROP INDEX {}{} ON {}",
            if if_exists { "IF EXISTS " } else { "" },
            self.quote_identifier(index),
            self.quote_identifier(table)
        )
    }

    fn format_create_index(
        &self,
        table: &str,
        index: &str,
        columns: &[String],
        unique: bool,
        if_not_exists: bool,
    ) -> String {
        let cols = columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE {}INDEX {}{} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.quote_identifier(index),
            self.quote_identifier(table),
            cols
        )
    }
}

/// The default token set, unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiFormatter;

impl SqlFormatter for AnsiFormatter {}

#[cfg(test)]
mod tests {
    use super::*;

    struct DollarFormatter;

    impl SqlFormatter for DollarFormatter {
        fn parameter_placeholder(&self, position: usize) -> String {
            format!("${position}")
        }

        fn quote_identifier(&self, name: &str) -> String {
            format!("`{name}`")
        }
    }

    #[test]
    fn test_default_tokens() {
        let f = AnsiFormatter;
        assert_eq!(f.quote_identifier("user\"s"), "\"user\"\"s\"");
        assert_eq!(f.parameter_placeholder(3), "?");
        assert_eq!(f.format_string("it's"), "'it''s'");
        assert_eq!(f.format_boolean(true), "TRUE");
        assert_eq!(f.format_limit_offset(Some(10), Some(20)), "LIMIT 10 OFFSET 20");
        assert_eq!(f.format_limit_offset(None, Some(5)), "OFFSET 5");
        assert_eq!(f.format_limit_offset(None, None), "");
    }

    #[test]
    fn test_column_types() {
        let f = AnsiFormatter;
        assert_eq!(f.map_column_type(&Column::text().length(64)), "VARCHAR(64)");
        assert_eq!(f.map_column_type(&Column::float()), "DOUBLE PRECISION");
        assert_eq!(f.map_column_type(&Column::date()), "TIMESTAMP");
    }

    #[test]
    fn test_create_table() {
        let f = AnsiFormatter;
        let sql = f
            .format_create_table(
                "users",
                &[
                    ColumnDef::new("id", Column::integer().primary().auto_increment()),
                    ColumnDef::new("email", Column::text().unique().not_null()),
                    ColumnDef::new("active", Column::boolean().default_value(true)),
                ],
                false,
            )
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\"id\" INTEGER PRIMARY KEY AUTO_INCREMENT, \
             \"email\" TEXT UNIQUE NOT NULL, \"active\" BOOLEAN DEFAULT TRUE)"
        );
    }

    #[test]
    fn test_default_value_rejects_lists() {
        let err = AnsiFormatter
            .format_default_value(&Value::from(vec![1, 2]))
            .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_overridden_tokens_only_change_tokens() {
        let f = DollarFormatter;
        assert_eq!(f.parameter_placeholder(2), "$2");
        assert_eq!(
            f.format_drop_index("users", "idx_email", true),
            "DROP INDEX IF EXISTS `idx_email` ON `users`"
        );
        assert_eq!(
            f.format_create_index("users", "idx", &["a".into(), "b".into()], true, false),
            "CREATE UNIQUE INDEX `idx` ON `users` (`a`, `b`)"
        );
    }

    #[test]
    fn test_alter_table() {
        let sql = AnsiFormatter
            .format_alter_table(
                "users",
                &[
                    Alteration::Add {
                        name: "age".into(),
                        column: Column::integer(),
                    },
                    Alteration::Drop { name: "nick".into() },
                ],
            )
            .unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE \"users\" ADD COLUMN \"age\" INTEGER, DROP COLUMN \"nick\""
        );
    }
}
