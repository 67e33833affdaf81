//! Column definitions and table schemas.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DbResult, ExecutionError};
use crate::value::{parse_iso_date, Value};

/// The closed set of column types every dialect understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Free-form string.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// True or false.
    Boolean,
    /// UTC timestamp.
    Date,
    /// Arbitrary JSON.
    Json,
}

impl ColumnType {
    /// Canonical lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Json => "json",
        }
    }

    /// Maps a SQL type name (as emitted by any dialect's `map_column_type`)
    /// back onto the closed set. Length suffixes such as `VARCHAR(64)` are
    /// ignored. Unknown names fall back to `Text`.
    #[must_use]
    pub fn from_sql_name(name: &str) -> Self {
        let base = name
            .split('(')
            .next()
            .unwrap_or(name)
            .trim()
            .to_ascii_lowercase();
        match base.as_str() {
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "serial" | "bigserial" => {
                Self::Integer
            }
            "float" | "real" | "double" | "double precision" | "decimal" | "numeric" => Self::Float,
            "bool" | "boolean" => Self::Boolean,
            "date" | "datetime" | "timestamp" | "timestamptz" => Self::Date,
            "json" | "jsonb" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Coerces `value` into this type for storage in `column`.
    ///
    /// Only lossless conversions are applied; anything else is a
    /// [`ExecutionError::TypeMismatch`]. `NULL` passes through.
    pub fn coerce(self, column: &str, value: Value) -> DbResult<Value> {
        let mismatch = |value: &Value| ExecutionError::TypeMismatch {
            column: column.to_string(),
            expected: self.name(),
            value: value.to_string(),
        };

        let coerced = match (self, value) {
            (_, Value::Null) => Value::Null,

            (Self::Text, Value::Text(s)) => Value::Text(s),
            (Self::Text, v @ (Value::Int(_) | Value::Float(_) | Value::Bool(_))) => {
                Value::Text(v.key_string())
            }
            (Self::Text, Value::Date(d)) => Value::Text(d.to_rfc3339()),

            (Self::Integer, Value::Int(v)) => Value::Int(v),
            (Self::Integer, Value::Bool(v)) => Value::Int(i64::from(v)),
            #[allow(clippy::cast_possible_truncation)]
            (Self::Integer, Value::Float(v)) if v.fract() == 0.0 && v.is_finite() => {
                Value::Int(v as i64)
            }
            (Self::Integer, Value::Text(s)) => match s.trim().parse::<i64>() {
                Ok(v) => Value::Int(v),
                Err(_) => return Err(mismatch(&Value::Text(s)).into()),
            },

            (Self::Float, Value::Float(v)) => Value::Float(v),
            #[allow(clippy::cast_precision_loss)]
            (Self::Float, Value::Int(v)) => Value::Float(v as f64),
            (Self::Float, Value::Text(s)) => match s.trim().parse::<f64>() {
                Ok(v) => Value::Float(v),
                Err(_) => return Err(mismatch(&Value::Text(s)).into()),
            },

            (Self::Boolean, Value::Bool(v)) => Value::Bool(v),
            (Self::Boolean, Value::Int(v)) if v == 0 || v == 1 => Value::Bool(v == 1),
            (Self::Boolean, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(mismatch(&Value::Text(s)).into()),
            },

            (Self::Date, Value::Date(d)) => Value::Date(d),
            (Self::Date, Value::Text(s)) => match parse_iso_date(&s) {
                Some(d) => Value::Date(d),
                None => return Err(mismatch(&Value::Text(s)).into()),
            },
            (Self::Date, Value::Int(ms)) => match Utc.timestamp_millis_opt(ms).single() {
                Some(d) => Value::Date(d),
                None => return Err(mismatch(&Value::Int(ms)).into()),
            },

            (Self::Json, Value::Json(v)) => Value::Json(v),
            (Self::Json, Value::List(items)) => Value::List(items),
            (Self::Json, Value::Text(s)) => match serde_json::from_str::<serde_json::Value>(&s) {
                Ok(json) => Value::from_json(json),
                Err(_) => Value::Text(s),
            },
            (Self::Json, v @ (Value::Int(_) | Value::Float(_) | Value::Bool(_))) => v,

            (_, other) => return Err(mismatch(&other).into()),
        };
        Ok(coerced)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn default_true() -> bool {
    true
}

/// Describes one field of a relational table.
///
/// # Examples
///
/// ```
/// use dialectdb::{Column, ColumnType};
///
/// let id = Column::integer().primary().auto_increment();
/// assert_eq!(id.column_type, ColumnType::Integer);
/// assert!(!id.nullable);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Storage type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// Optional length, e.g. `VARCHAR(n)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Whether `NULL` is accepted.
    #[serde(default = "default_true")]
    pub nullable: bool,

    /// Part of the primary key.
    #[serde(default)]
    pub primary: bool,

    /// Values must be distinct.
    #[serde(default)]
    pub unique: bool,

    /// Value used when an insert omits the column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Receives generated ids when also primary.
    #[serde(default)]
    pub auto_increment: bool,
}

impl Column {
    /// A nullable column of `column_type`.
    #[must_use]
    pub const fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            length: None,
            nullable: true,
            primary: false,
            unique: false,
            default: None,
            auto_increment: false,
        }
    }

    /// A text column.
    #[must_use]
    pub const fn text() -> Self {
        Self::new(ColumnType::Text)
    }

    /// An integer column.
    #[must_use]
    pub const fn integer() -> Self {
        Self::new(ColumnType::Integer)
    }

    /// A float column.
    #[must_use]
    pub const fn float() -> Self {
        Self::new(ColumnType::Float)
    }

    /// A boolean column.
    #[must_use]
    pub const fn boolean() -> Self {
        Self::new(ColumnType::Boolean)
    }

    /// A date column.
    #[must_use]
    pub const fn date() -> Self {
        Self::new(ColumnType::Date)
    }

    /// A JSON column.
    #[must_use]
    pub const fn json() -> Self {
        Self::new(ColumnType::Json)
    }

    /// Sets the declared length.
    #[must_use]
    pub const fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Rejects `NULL`.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the column as the primary key. Primary keys are never nullable.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    /// Requires distinct values.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the insert default.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Generates ids on insert.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// True for the column that receives generated identity values.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.auto_increment && self.primary
    }
}

/// A named column, in table order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column definition.
    #[serde(flatten)]
    pub column: Column,
}

impl ColumnDef {
    /// Pairs a name with a definition.
    #[must_use]
    pub fn new(name: impl Into<String>, column: Column) -> Self {
        Self {
            name: name.into(),
            column,
        }
    }
}

/// Ordered column list of one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// An empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, replacing an existing one of the same name.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, column: Column) -> Self {
        let def = ColumnDef::new(name, column);
        match self.columns.iter_mut().find(|c| c.name == def.name) {
            Some(existing) => *existing = def,
            None => self.columns.push(def),
        }
        self
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Looks a column up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.column)
    }

    /// True when no columns are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl From<Vec<ColumnDef>> for TableSchema {
    fn from(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }
}

/// Table name to schema; used for provisioning at startup.
pub type Schemas = BTreeMap<String, TableSchema>;
