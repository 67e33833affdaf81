//! Named table handles.

use std::fmt;
use std::sync::Arc;

use crate::condition::Condition;
use crate::dialect::Dialect;
use crate::error::DbResult;
use crate::query::{QueryParams, QueryResult, SelectParams};
use crate::value::Row;

use super::execute_on;

/// CRUD shortcuts bound to one table, collection or bucket.
///
/// Models are cached per name by [`Database::model`](super::Database::model).
pub struct Model<D: Dialect> {
    name: String,
    dialect: Arc<D>,
}

impl<D: Dialect> fmt::Debug for Model<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("dialect", &self.dialect.name())
            .finish()
    }
}

fn non_empty(conditions: Condition) -> Option<Condition> {
    (!conditions.is_empty()).then_some(conditions)
}

impl<D: Dialect> Model<D> {
    pub(crate) fn new(name: &str, dialect: Arc<D>) -> Self {
        Self {
            name: name.to_string(),
            dialect,
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs a select with full control over projection, ordering and paging.
    /// The table name of `params` is replaced by the model's.
    pub async fn select(&self, mut params: SelectParams) -> DbResult<Vec<Row>> {
        params.table_name.clone_from(&self.name);
        let result = execute_on(self.dialect.as_ref(), &QueryParams::Select(params)).await?;
        Ok(result.rows)
    }

    /// Every row matching `conditions`.
    pub async fn find(&self, conditions: Condition) -> DbResult<Vec<Row>> {
        let mut params = SelectParams::new(self.name.clone());
        params.conditions = non_empty(conditions);
        self.select(params).await
    }

    /// The first row matching `conditions`.
    pub async fn find_one(&self, conditions: Condition) -> DbResult<Option<Row>> {
        let mut params = SelectParams::new(self.name.clone()).limit(1);
        params.conditions = non_empty(conditions);
        Ok(self.select(params).await?.into_iter().next())
    }

    /// Inserts `data`; the result carries the generated identity, if any.
    pub async fn create(&self, data: Row) -> DbResult<QueryResult> {
        execute_on(
            self.dialect.as_ref(),
            &QueryParams::Insert {
                table_name: self.name.clone(),
                data,
            },
        )
        .await
    }

    /// Applies `update` to matching rows and returns how many changed.
    pub async fn update(&self, conditions: Condition, update: Row) -> DbResult<u64> {
        let result = execute_on(
            self.dialect.as_ref(),
            &QueryParams::Update {
                table_name: self.name.clone(),
                update,
                conditions: non_empty(conditions),
            },
        )
        .await?;
        Ok(result.affected_rows)
    }

    /// Deletes matching rows and returns how many were removed.
    pub async fn remove(&self, conditions: Condition) -> DbResult<u64> {
        let result = execute_on(
            self.dialect.as_ref(),
            &QueryParams::Delete {
                table_name: self.name.clone(),
                conditions: non_empty(conditions),
            },
        )
        .await?;
        Ok(result.affected_rows)
    }

    /// Number of matching rows.
    pub async fn count(&self, conditions: Condition) -> DbResult<u64> {
        Ok(self.find(conditions).await?.len() as u64)
    }
}
