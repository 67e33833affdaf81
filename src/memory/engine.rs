//! Statement execution over the in-memory table store.
//!
//! Every executor validates the whole statement before touching state, so a
//! failing statement leaves tables, indexes and counters unchanged.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::column::ColumnDef;
use crate::error::{invalid_statement, table_not_found, DbError, DbResult, ExecutionError};
use crate::memory::eval;
use crate::query::{Alteration, QueryResult, SortDirection};
use crate::statement::{Operand, Predicate, Select, Statement};
use crate::value::{Row, Value};

use super::table::{check_distinct, composite_key, Index, MemoryTable};
use super::MemoryConfig;

static NULL: Value = Value::Null;

/// Tables plus auto-increment counters (`table -> column -> last value`).
#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub tables: HashMap<String, MemoryTable>,
    pub counters: HashMap<String, HashMap<String, i64>>,
}

fn not_null_violation(table: &str, column: &str) -> DbError {
    ExecutionError::ConstraintViolation {
        table: table.to_string(),
        message: format!("column {column} cannot be null"),
    }
    .into()
}

fn requires_value(def: &ColumnDef) -> bool {
    !def.column.nullable || def.column.primary
}

impl MemoryState {
    fn table(&self, name: &str) -> DbResult<&MemoryTable> {
        self.tables.get(name).ok_or_else(|| table_not_found(name))
    }

    fn counter(&self, table: &str, column: &str) -> i64 {
        self.counters
            .get(table)
            .and_then(|columns| columns.get(column))
            .copied()
            .unwrap_or(0)
    }

    fn set_counter(&mut self, table: &str, column: &str, value: i64) {
        self.counters
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), value);
    }

    /// Executes a statement that may write.
    pub fn apply(&mut self, statement: &Statement, params: &[Value], config: &MemoryConfig) -> DbResult<QueryResult> {
        match statement {
            Statement::Select(select) => self.select(select, params, config),
            Statement::CreateTable {
                table,
                columns,
                if_not_exists,
            } => self.create_table(table, columns, *if_not_exists),
            Statement::CreateIndex {
                table,
                index,
                columns,
                unique,
                if_not_exists,
            } => self.create_index(table, index, columns, *unique, *if_not_exists, config),
            Statement::Insert {
                table,
                columns,
                values,
            } => self.insert(table, columns, values, params, config),
            Statement::Update {
                table,
                assignments,
                filter,
            } => self.update(table, assignments, filter.as_ref(), params, config),
            Statement::Delete { table, filter } => self.delete(table, filter.as_ref(), params, config),
            Statement::AlterTable { table, alterations } => self.alter(table, alterations, config),
            Statement::DropTable { table, if_exists } => self.drop_table(table, *if_exists),
            Statement::DropIndex {
                table,
                index,
                if_exists,
            } => self.drop_index(table, index, *if_exists),
        }
    }

    fn check_filter(table: &MemoryTable, filter: Option<&Predicate>) -> DbResult<()> {
        if let Some(filter) = filter {
            let mut columns = Vec::new();
            eval::referenced_columns(filter, &mut columns);
            for column in columns {
                table.require_column(column)?;
            }
        }
        Ok(())
    }

    /// Positions of rows matching `filter`, in storage order.
    fn matching(
        table: &MemoryTable,
        filter: Option<&Predicate>,
        params: &[Value],
        config: &MemoryConfig,
    ) -> DbResult<Vec<usize>> {
        Self::check_filter(table, filter)?;
        let Some(filter) = filter else {
            return Ok((0..table.rows.len()).collect());
        };
        let mut hits = Vec::new();
        for (pos, row) in table.rows.iter().enumerate() {
            if eval::matches(filter, row, params, config.case_sensitive_like)? {
                hits.push(pos);
            }
        }
        Ok(hits)
    }

    pub fn select(&self, select: &Select, params: &[Value], config: &MemoryConfig) -> DbResult<QueryResult> {
        let table = self.table(&select.table)?;
        for column in &select.group_by {
            table.require_column(column)?;
        }
        for ordering in &select.order_by {
            table.require_column(&ordering.field)?;
        }
        let star = select.fields.is_empty() || select.fields.iter().any(|f| f == "*");
        if !star {
            for field in &select.fields {
                table.require_column(field)?;
            }
        }

        let positions = Self::matching(table, select.filter.as_ref(), params, config)?;
        let mut rows: Vec<&Row> = positions.into_iter().map(|pos| &table.rows[pos]).collect();

        if !select.group_by.is_empty() {
            let mut seen = HashSet::new();
            rows.retain(|row| seen.insert(composite_key(&select.group_by, |c| row.get(c))));
        }

        if !select.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for ordering in &select.order_by {
                    let left = a.get(&ordering.field).unwrap_or(&NULL);
                    let right = b.get(&ordering.field).unwrap_or(&NULL);
                    let ord = match ordering.direction {
                        SortDirection::Asc => left.sort_cmp(right),
                        SortDirection::Desc => right.sort_cmp(left),
                    };
                    if ord != CmpOrdering::Equal {
                        return ord;
                    }
                }
                CmpOrdering::Equal
            });
        }

        let skip = usize::try_from(select.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let take = select
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        let rows = rows
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| {
                if star {
                    row.clone()
                } else {
                    select
                        .fields
                        .iter()
                        .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(Value::Null)))
                        .collect()
                }
            })
            .collect();
        Ok(QueryResult::with_rows(rows))
    }

    fn create_table(&mut self, name: &str, columns: &[ColumnDef], if_not_exists: bool) -> DbResult<QueryResult> {
        if self.tables.contains_key(name) {
            if if_not_exists {
                return Ok(QueryResult::ack());
            }
            return Err(ExecutionError::TableExists {
                table: name.to_string(),
            }
            .into());
        }
        if columns.is_empty() {
            return Err(invalid_statement("CREATE TABLE", &format!("table {name} has no columns")));
        }
        for def in columns {
            if let Some(default) = &def.column.default {
                def.column.column_type.coerce(&def.name, default.clone())?;
            }
        }
        let table = MemoryTable::new(name, columns.to_vec())?;
        self.tables.insert(name.to_string(), table);
        self.counters.remove(name);
        debug!(table = name, columns = columns.len(), "created table");
        Ok(QueryResult::ack())
    }

    fn create_index(
        &mut self,
        table_name: &str,
        index_name: &str,
        columns: &[String],
        unique: bool,
        if_not_exists: bool,
        config: &MemoryConfig,
    ) -> DbResult<QueryResult> {
        let table = self.table(table_name)?;
        if table.indexes.contains_key(index_name) {
            if if_not_exists {
                return Ok(QueryResult::ack());
            }
            return Err(ExecutionError::IndexExists {
                table: table_name.to_string(),
                index: index_name.to_string(),
            }
            .into());
        }
        if columns.is_empty() {
            return Err(invalid_statement(
                "CREATE INDEX",
                &format!("index {index_name} on {table_name} names no columns"),
            ));
        }
        for column in columns {
            table.require_column(column)?;
        }
        if unique && config.enforce_unique {
            check_distinct(columns, &table.rows).map_err(|key| ExecutionError::ConstraintViolation {
                table: table_name.to_string(),
                message: format!("cannot build unique index {index_name}: duplicate value '{key}'"),
            })?;
        }

        let index = Index::build(columns.to_vec(), unique, &table.rows);
        if let Some(table) = self.tables.get_mut(table_name) {
            table.indexes.insert(index_name.to_string(), index);
        }
        debug!(table = table_name, index = index_name, unique, "created index");
        Ok(QueryResult::ack())
    }

    fn insert(
        &mut self,
        table_name: &str,
        columns: &[String],
        values: &[Operand],
        params: &[Value],
        config: &MemoryConfig,
    ) -> DbResult<QueryResult> {
        if columns.len() != values.len() {
            return Err(ExecutionError::ColumnCountMismatch {
                columns: columns.len(),
                values: values.len(),
            }
            .into());
        }
        let table = self.table(table_name)?;

        let mut row = Row::new();
        for (column, operand) in columns.iter().zip(values) {
            let def = table.require_column(column)?;
            let value = def.column_type.coerce(column, operand.resolve(params)?)?;
            row.insert(column.clone(), value);
        }

        let mut next_counter = None;
        if let Some(identity) = table.identity() {
            let last = self.counter(table_name, &identity.name);
            match row.get(&identity.name) {
                None | Some(Value::Null) => {
                    let next = last.checked_add(1).ok_or_else(|| ExecutionError::ConstraintViolation {
                        table: table_name.to_string(),
                        message: format!("identity column {} is exhausted", identity.name),
                    })?;
                    row.insert(identity.name.clone(), Value::Int(next));
                    next_counter = Some((identity.name.clone(), next));
                }
                Some(Value::Int(explicit)) if *explicit > last => {
                    next_counter = Some((identity.name.clone(), *explicit));
                }
                Some(_) => {}
            }
        }

        for def in &table.columns {
            if !row.contains_key(&def.name) {
                let value = match &def.column.default {
                    Some(default) => def.column.column_type.coerce(&def.name, default.clone())?,
                    None => Value::Null,
                };
                row.insert(def.name.clone(), value);
            }
            if requires_value(def) && row.get(&def.name).map_or(true, Value::is_null) {
                return Err(not_null_violation(table_name, &def.name));
            }
        }

        if config.enforce_unique {
            table.check_unique_row(&row, None)?;
        }

        let insert_id = table
            .identity()
            .or_else(|| table.columns.iter().find(|c| c.column.primary))
            .and_then(|def| row.get(&def.name))
            .cloned();

        if let Some((column, value)) = next_counter {
            self.set_counter(table_name, &column, value);
        }
        if let Some(table) = self.tables.get_mut(table_name) {
            table.push(row);
        }

        Ok(QueryResult {
            rows: Vec::new(),
            affected_rows: 1,
            insert_id,
        })
    }

    fn update(
        &mut self,
        table_name: &str,
        assignments: &[(String, Operand)],
        filter: Option<&Predicate>,
        params: &[Value],
        config: &MemoryConfig,
    ) -> DbResult<QueryResult> {
        let table = self.table(table_name)?;

        let mut changes = Vec::with_capacity(assignments.len());
        for (column, operand) in assignments {
            let def = table.require_column(column)?;
            let value = def.column_type.coerce(column, operand.resolve(params)?)?;
            if (!def.nullable || def.primary) && value.is_null() {
                return Err(not_null_violation(table_name, column));
            }
            changes.push((column.clone(), value));
        }

        let matched = Self::matching(table, filter, params, config)?;
        if matched.is_empty() {
            return Ok(QueryResult::affected(0));
        }

        let mut next = table.clone();
        for &pos in &matched {
            for (column, value) in &changes {
                next.rows[pos].insert(column.clone(), value.clone());
            }
        }
        if config.enforce_unique {
            next.check_unique_all()?;
        }
        next.reindex();

        let identity_bump = next.identity().and_then(|identity| {
            changes
                .iter()
                .find(|(column, _)| *column == identity.name)
                .and_then(|(_, value)| value.as_int())
                .filter(|v| *v > self.counter(table_name, &identity.name))
                .map(|v| (identity.name.clone(), v))
        });
        if let Some((column, value)) = identity_bump {
            self.set_counter(table_name, &column, value);
        }
        self.tables.insert(table_name.to_string(), next);
        Ok(QueryResult::affected(matched.len() as u64))
    }

    fn delete(
        &mut self,
        table_name: &str,
        filter: Option<&Predicate>,
        params: &[Value],
        config: &MemoryConfig,
    ) -> DbResult<QueryResult> {
        let table = self.table(table_name)?;
        let matched = Self::matching(table, filter, params, config)?;
        if matched.is_empty() {
            return Ok(QueryResult::affected(0));
        }

        let doomed: HashSet<usize> = matched.iter().copied().collect();
        if let Some(table) = self.tables.get_mut(table_name) {
            let mut pos = 0;
            table.rows.retain(|_| {
                let keep = !doomed.contains(&pos);
                pos += 1;
                keep
            });
            table.reindex();
        }
        Ok(QueryResult::affected(matched.len() as u64))
    }

    fn alter(&mut self, table_name: &str, alterations: &[Alteration], config: &MemoryConfig) -> DbResult<QueryResult> {
        let mut next = self.table(table_name)?.clone();
        let mut counter = next
            .identity()
            .map(|identity| (identity.name.clone(), self.counter(table_name, &identity.name)));

        for alteration in alterations {
            match alteration {
                Alteration::Add { name, column } => {
                    if next.column(name).is_some() {
                        return Err(ExecutionError::ColumnExists {
                            table: table_name.to_string(),
                            column: name.clone(),
                        }
                        .into());
                    }
                    let def = ColumnDef::new(name.clone(), column.clone());
                    let default = match &column.default {
                        Some(default) => column.column_type.coerce(name, default.clone())?,
                        None => Value::Null,
                    };
                    if column.is_identity() {
                        let mut last = 0;
                        for row in &mut next.rows {
                            last += 1;
                            row.insert(name.clone(), Value::Int(last));
                        }
                        counter = Some((name.clone(), last));
                    } else {
                        if requires_value(&def) && default.is_null() && !next.rows.is_empty() {
                            return Err(not_null_violation(table_name, name));
                        }
                        for row in &mut next.rows {
                            row.insert(name.clone(), default.clone());
                        }
                    }
                    next.columns.push(def);
                }
                Alteration::Drop { name } => {
                    next.require_column(name)?;
                    next.columns.retain(|c| c.name != *name);
                    for row in &mut next.rows {
                        row.remove(name);
                    }
                    next.indexes.retain(|_, index| !index.columns.contains(name));
                    if counter.as_ref().is_some_and(|(column, _)| column == name) {
                        counter = None;
                    }
                }
                Alteration::Modify { name, column } => {
                    next.require_column(name)?;
                    let def = ColumnDef::new(name.clone(), column.clone());
                    for row in &mut next.rows {
                        let current = row.remove(name).unwrap_or(Value::Null);
                        let value = column.column_type.coerce(name, current)?;
                        if requires_value(&def) && value.is_null() {
                            return Err(not_null_violation(table_name, name));
                        }
                        row.insert(name.clone(), value);
                    }
                    if let Some(slot) = next.columns.iter_mut().find(|c| c.name == *name) {
                        *slot = def;
                    }
                }
            }
        }

        next.validate_columns()?;
        if config.enforce_unique {
            next.check_unique_all()?;
        }
        next.reindex();

        self.counters.remove(table_name);
        if let Some((column, value)) = counter {
            self.set_counter(table_name, &column, value);
        }
        self.tables.insert(table_name.to_string(), next);
        debug!(table = table_name, alterations = alterations.len(), "altered table");
        Ok(QueryResult::ack())
    }

    fn drop_table(&mut self, name: &str, if_exists: bool) -> DbResult<QueryResult> {
        if self.tables.remove(name).is_none() {
            if if_exists {
                return Ok(QueryResult::ack());
            }
            return Err(table_not_found(name));
        }
        self.counters.remove(name);
        debug!(table = name, "dropped table");
        Ok(QueryResult::ack())
    }

    fn drop_index(&mut self, table_name: &str, index_name: &str, if_exists: bool) -> DbResult<QueryResult> {
        let removed = match self.tables.get_mut(table_name) {
            Some(table) => table.indexes.remove(index_name).is_some(),
            None if if_exists => return Ok(QueryResult::ack()),
            None => return Err(table_not_found(table_name)),
        };
        if !removed && !if_exists {
            return Err(ExecutionError::IndexNotFound {
                table: table_name.to_string(),
                index: index_name.to_string(),
            }
            .into());
        }
        Ok(QueryResult::ack())
    }

    /// Rows whose indexed columns equal `key`, in storage order.
    pub fn index_lookup(&self, table_name: &str, index_name: &str, key: &[Value]) -> DbResult<Vec<Row>> {
        let table = self.table(table_name)?;
        let index = table.indexes.get(index_name).ok_or_else(|| ExecutionError::IndexNotFound {
            table: table_name.to_string(),
            index: index_name.to_string(),
        })?;
        let key = composite_key(&index.columns, |column| {
            index
                .columns
                .iter()
                .position(|c| c == column)
                .and_then(|i| key.get(i))
        });
        Ok(index
            .lookup(&key)
            .iter()
            .filter_map(|&pos| table.rows.get(pos).cloned())
            .collect())
    }

    pub fn index_names(&self, table_name: &str) -> DbResult<Vec<String>> {
        Ok(self.table(table_name)?.indexes.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::query::Ordering;
    use crate::row;
    use crate::statement::CompareOp;

    fn config() -> MemoryConfig {
        MemoryConfig::default()
    }

    fn lit(v: impl Into<Value>) -> Operand {
        Operand::Literal(v.into())
    }

    fn state_with_users() -> MemoryState {
        let mut state = MemoryState::default();
        state
            .apply(
                &Statement::CreateTable {
                    table: "users".into(),
                    columns: vec![
                        ColumnDef::new("id", Column::integer().primary().auto_increment()),
                        ColumnDef::new("name", Column::text().not_null()),
                        ColumnDef::new("role", Column::text().default_value("member")),
                        ColumnDef::new("age", Column::integer()),
                    ],
                    if_not_exists: false,
                },
                &[],
                &config(),
            )
            .unwrap();
        state
    }

    fn insert(state: &mut MemoryState, name: &str, age: i64) -> QueryResult {
        state
            .apply(
                &Statement::Insert {
                    table: "users".into(),
                    columns: vec!["name".into(), "age".into()],
                    values: vec![Operand::Param(0), Operand::Param(1)],
                },
                &[Value::from(name), Value::Int(age)],
                &config(),
            )
            .unwrap()
    }

    fn select_all(state: &MemoryState, select: Select) -> Vec<Row> {
        state.select(&select, &[], &config()).unwrap().rows
    }

    #[test]
    fn test_auto_increment_and_defaults() {
        let mut state = state_with_users();
        let ids: Vec<_> = ["ada", "bob", "cy"]
            .iter()
            .map(|n| insert(&mut state, n, 30).insert_id.unwrap())
            .collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);

        let rows = select_all(&state, Select::new("users"));
        assert_eq!(rows[0]["role"], Value::from("member"));
        assert_eq!(rows[2]["name"], Value::from("cy"));
    }

    #[test]
    fn test_explicit_id_advances_counter() {
        let mut state = state_with_users();
        state
            .apply(
                &Statement::Insert {
                    table: "users".into(),
                    columns: vec!["id".into(), "name".into()],
                    values: vec![lit(10), lit("x")],
                },
                &[],
                &config(),
            )
            .unwrap();
        assert_eq!(insert(&mut state, "y", 1).insert_id, Some(Value::Int(11)));
    }

    #[test]
    fn test_exhausted_identity_errors_instead_of_wrapping() {
        let mut state = state_with_users();
        state
            .apply(
                &Statement::Insert {
                    table: "users".into(),
                    columns: vec!["id".into(), "name".into()],
                    values: vec![lit(i64::MAX), lit("last")],
                },
                &[],
                &config(),
            )
            .unwrap();
        let err = state
            .apply(
                &Statement::Insert {
                    table: "users".into(),
                    columns: vec!["name".into()],
                    values: vec![lit("next")],
                },
                &[],
                &config(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("exhausted"));

        state
            .apply(
                &Statement::Insert {
                    table: "users".into(),
                    columns: vec!["id".into(), "name".into()],
                    values: vec![lit(7), lit("manual")],
                },
                &[],
                &config(),
            )
            .unwrap();
        assert_eq!(select_all(&state, Select::new("users")).len(), 2);
    }

    #[test]
    fn test_auto_increment_without_primary_is_plain() {
        let mut state = MemoryState::default();
        state
            .apply(
                &Statement::CreateTable {
                    table: "events".into(),
                    columns: vec![
                        ColumnDef::new("seq", Column::integer().auto_increment()),
                        ColumnDef::new("kind", Column::text()),
                    ],
                    if_not_exists: false,
                },
                &[],
                &config(),
            )
            .unwrap();
        let result = state
            .apply(
                &Statement::Insert {
                    table: "events".into(),
                    columns: vec!["kind".into()],
                    values: vec![lit("login")],
                },
                &[],
                &config(),
            )
            .unwrap();
        assert_eq!(result.insert_id, None);
        let rows = select_all(&state, Select::new("events"));
        assert_eq!(rows[0]["seq"], Value::Null);
    }

    #[test]
    fn test_failed_insert_leaves_state_unchanged() {
        let mut state = state_with_users();
        insert(&mut state, "ada", 30);
        let err = state
            .apply(
                &Statement::Insert {
                    table: "users".into(),
                    columns: vec!["id".into(), "name".into()],
                    values: vec![lit(1), lit("dup")],
                },
                &[],
                &config(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        let err = state
            .apply(
                &Statement::Insert {
                    table: "users".into(),
                    columns: vec!["age".into()],
                    values: vec![lit(3)],
                },
                &[],
                &config(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("cannot be null"));

        assert_eq!(select_all(&state, Select::new("users")).len(), 1);
        assert_eq!(insert(&mut state, "bob", 1).insert_id, Some(Value::Int(2)));
    }

    #[test]
    fn test_select_shaping() {
        let mut state = state_with_users();
        for (name, age) in [("ada", 30), ("bob", 25), ("cy", 30), ("di", 41)] {
            insert(&mut state, name, age);
        }
        let mut select = Select::new("users");
        select.fields = vec!["name".into()];
        select.order_by = vec![Ordering::desc("age"), Ordering::asc("name")];
        select.offset = Some(1);
        select.limit = Some(2);
        let names: Vec<_> = select_all(&state, select)
            .into_iter()
            .map(|r| r["name"].clone())
            .collect();
        assert_eq!(names, vec![Value::from("ada"), Value::from("cy")]);

        let mut grouped = Select::new("users");
        grouped.group_by = vec!["age".into()];
        assert_eq!(select_all(&state, grouped).len(), 3);
    }

    #[test]
    fn test_unknown_columns_are_errors() {
        let state = state_with_users();
        let mut select = Select::new("users");
        select.fields = vec!["nope".into()];
        assert!(state.select(&select, &[], &config()).unwrap_err().is_not_found());

        let mut select = Select::new("users");
        select.filter = Some(Predicate::compare("nope", CompareOp::Eq, lit(1)));
        assert!(state.select(&select, &[], &config()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_and_delete_scoping() {
        let mut state = state_with_users();
        for name in ["a", "b", "c"] {
            insert(&mut state, name, 1);
        }
        let result = state
            .apply(
                &Statement::Update {
                    table: "users".into(),
                    assignments: vec![("age".into(), Operand::Param(0))],
                    filter: Some(Predicate::compare("id", CompareOp::Eq, Operand::Param(1))),
                },
                &[Value::Int(99), Value::Int(2)],
                &config(),
            )
            .unwrap();
        assert_eq!(result.affected_rows, 1);
        let ages: Vec<_> = select_all(&state, Select::new("users"))
            .into_iter()
            .map(|r| r["age"].clone())
            .collect();
        assert_eq!(ages, vec![Value::Int(1), Value::Int(99), Value::Int(1)]);

        let result = state
            .apply(
                &Statement::Delete {
                    table: "users".into(),
                    filter: Some(Predicate::compare("age", CompareOp::Eq, lit(1))),
                },
                &[],
                &config(),
            )
            .unwrap();
        assert_eq!(result.affected_rows, 2);
        assert_eq!(select_all(&state, Select::new("users")).len(), 1);
    }

    #[test]
    fn test_alter_add_drop_modify() {
        let mut state = state_with_users();
        insert(&mut state, "ada", 30);
        state
            .apply(
                &Statement::AlterTable {
                    table: "users".into(),
                    alterations: vec![
                        Alteration::Add {
                            name: "active".into(),
                            column: Column::boolean().default_value(true),
                        },
                        Alteration::Drop { name: "role".into() },
                        Alteration::Modify {
                            name: "age".into(),
                            column: Column::text(),
                        },
                    ],
                },
                &[],
                &config(),
            )
            .unwrap();
        let row = &select_all(&state, Select::new("users"))[0];
        assert_eq!(row["active"], Value::Bool(true));
        assert!(!row.contains_key("role"));
        assert_eq!(row["age"], Value::from("30"));
    }

    #[test]
    fn test_failed_alter_is_atomic() {
        let mut state = state_with_users();
        insert(&mut state, "ada", 30);
        let err = state
            .apply(
                &Statement::AlterTable {
                    table: "users".into(),
                    alterations: vec![
                        Alteration::Add {
                            name: "extra".into(),
                            column: Column::text(),
                        },
                        Alteration::Drop { name: "missing".into() },
                    ],
                },
                &[],
                &config(),
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!select_all(&state, Select::new("users"))[0].contains_key("extra"));
    }

    #[test]
    fn test_index_lifecycle() {
        let mut state = state_with_users();
        insert(&mut state, "ada", 30);
        insert(&mut state, "bob", 30);
        state
            .apply(
                &Statement::CreateIndex {
                    table: "users".into(),
                    index: "idx_age".into(),
                    columns: vec!["age".into()],
                    unique: false,
                    if_not_exists: false,
                },
                &[],
                &config(),
            )
            .unwrap();
        assert_eq!(state.index_lookup("users", "idx_age", &[Value::Int(30)]).unwrap().len(), 2);
        assert_eq!(state.index_names("users").unwrap(), vec!["idx_age".to_string()]);

        let err = state
            .apply(
                &Statement::CreateIndex {
                    table: "users".into(),
                    index: "uniq_age".into(),
                    columns: vec!["age".into()],
                    unique: true,
                    if_not_exists: false,
                },
                &[],
                &config(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));

        let drop = |if_exists| Statement::DropIndex {
            table: "users".into(),
            index: "idx_age".into(),
            if_exists,
        };
        state.apply(&drop(false), &[], &config()).unwrap();
        assert!(state.apply(&drop(false), &[], &config()).unwrap_err().is_not_found());
        state.apply(&drop(true), &[], &config()).unwrap();
    }

    #[test]
    fn test_drop_table_idempotence() {
        let mut state = MemoryState::default();
        let drop = |if_exists| Statement::DropTable {
            table: "ghost".into(),
            if_exists,
        };
        assert_eq!(state.apply(&drop(true), &[], &config()).unwrap(), QueryResult::ack());
        assert!(state.apply(&drop(false), &[], &config()).unwrap_err().is_not_found());
    }
}
