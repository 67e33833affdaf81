//! Table storage and index bookkeeping.

use std::collections::{BTreeMap, HashMap};

use crate::column::{Column, ColumnDef};
use crate::error::{DbResult, ExecutionError};
use crate::value::{Row, Value};

const KEY_SEPARATOR: char = '\u{1f}';

/// Composite index key of `row` over `columns`.
pub(crate) fn composite_key<'a>(columns: &[String], mut get: impl FnMut(&str) -> Option<&'a Value>) -> String {
    let mut key = String::new();
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(&get(column).map_or_else(|| "null".to_string(), Value::key_string));
    }
    key
}

fn row_key(columns: &[String], row: &Row) -> String {
    composite_key(columns, |c| row.get(c))
}

/// Composite key to row positions.
#[derive(Debug, Clone)]
pub(crate) struct Index {
    pub columns: Vec<String>,
    pub unique: bool,
    pub entries: HashMap<String, Vec<usize>>,
}

impl Index {
    pub fn build(columns: Vec<String>, unique: bool, rows: &[Row]) -> Self {
        let mut index = Self {
            columns,
            unique,
            entries: HashMap::new(),
        };
        for (pos, row) in rows.iter().enumerate() {
            index.add(pos, row);
        }
        index
    }

    pub fn add(&mut self, pos: usize, row: &Row) {
        let key = row_key(&self.columns, row);
        self.entries.entry(key).or_default().push(pos);
    }

    pub fn lookup(&self, key: &str) -> &[usize] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

/// One table of the memory engine.
#[derive(Debug, Clone)]
pub(crate) struct MemoryTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
    pub indexes: BTreeMap<String, Index>,
}

impl MemoryTable {
    pub fn new(name: &str, columns: Vec<ColumnDef>) -> DbResult<Self> {
        let table = Self {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
            indexes: BTreeMap::new(),
        };
        table.validate_columns()?;
        Ok(table)
    }

    /// At most one auto-increment column and no duplicate names.
    pub fn validate_columns(&self) -> DbResult<()> {
        if self.columns.iter().filter(|c| c.column.auto_increment).count() > 1 {
            return Err(ExecutionError::MultipleAutoIncrement {
                table: self.name.clone(),
            }
            .into());
        }
        for (i, def) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == def.name) {
                return Err(ExecutionError::ColumnExists {
                    table: self.name.clone(),
                    column: def.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.column)
    }

    pub fn require_column(&self, name: &str) -> DbResult<&Column> {
        self.column(name).ok_or_else(|| {
            ExecutionError::ColumnNotFound {
                table: self.name.clone(),
                column: name.to_string(),
            }
            .into()
        })
    }

    /// The auto-increment primary column, if any.
    pub fn identity(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.column.is_identity())
    }

    pub fn reindex(&mut self) {
        for index in self.indexes.values_mut() {
            *index = Index::build(std::mem::take(&mut index.columns), index.unique, &self.rows);
        }
    }

    /// Appends a row that has already been validated.
    pub fn push(&mut self, row: Row) {
        let pos = self.rows.len();
        for index in self.indexes.values_mut() {
            index.add(pos, &row);
        }
        self.rows.push(row);
    }

    /// Column sets whose values must be unique: primary and unique columns
    /// plus unique indexes.
    fn unique_sets(&self) -> Vec<(String, Vec<String>)> {
        let mut sets: Vec<(String, Vec<String>)> = self
            .columns
            .iter()
            .filter(|c| c.column.primary || c.column.unique)
            .map(|c| (c.name.clone(), vec![c.name.clone()]))
            .collect();
        sets.extend(
            self.indexes
                .iter()
                .filter(|(_, index)| index.unique)
                .map(|(name, index)| (name.clone(), index.columns.clone())),
        );
        sets
    }

    /// Rejects `candidate` if it collides with an existing row on a unique
    /// column set. `skip` excludes one position (the row being replaced).
    pub fn check_unique_row(&self, candidate: &Row, skip: Option<usize>) -> DbResult<()> {
        for (label, columns) in self.unique_sets() {
            if columns.iter().all(|c| candidate.get(c).map_or(true, Value::is_null)) {
                continue;
            }
            let key = row_key(&columns, candidate);
            let clash = self
                .rows
                .iter()
                .enumerate()
                .any(|(pos, row)| Some(pos) != skip && row_key(&columns, row) == key);
            if clash {
                return Err(self.duplicate(&label, &key));
            }
        }
        Ok(())
    }

    /// Rejects any duplicate among the current rows.
    pub fn check_unique_all(&self) -> DbResult<()> {
        for (label, columns) in self.unique_sets() {
            check_distinct(&columns, &self.rows).map_err(|key| self.duplicate(&label, &key))?;
        }
        Ok(())
    }

    fn duplicate(&self, label: &str, key: &str) -> crate::error::DbError {
        ExecutionError::ConstraintViolation {
            table: self.name.clone(),
            message: format!(
                "duplicate value '{}' for unique key {label}",
                key.replace(KEY_SEPARATOR, ", ")
            ),
        }
        .into()
    }
}

/// Fails with the first key seen twice. Keys whose columns are all null are
/// exempt.
pub(crate) fn check_distinct(columns: &[String], rows: &[Row]) -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for row in rows {
        if columns.iter().all(|c| row.get(c).map_or(true, Value::is_null)) {
            continue;
        }
        let key = row_key(columns, row);
        if !seen.insert(key.clone()) {
            return Err(key);
        }
    }
    Ok(())
}
