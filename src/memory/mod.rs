//! In-memory reference dialects.
//!
//! [`MemoryDialect`] is a miniature relational engine: table storage,
//! auto-increment counters, index bookkeeping and a SQL front end for the
//! statement subset the relational compiler renders. [`MemoryDocumentDialect`]
//! and [`MemoryKeyValueDialect`] cover the other two paradigms.
//!
//! All three are volatile: `connect` and `disconnect` discard every table,
//! collection and bucket.

mod document;
mod engine;
mod eval;
mod key_value;
mod sql;
mod table;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::column::Column;
use crate::database::Relational;
use crate::dialect::{Dialect, DialectConfig, SqlFormatter};
use crate::error::{lock_err, DbResult, ExecutionError};
use crate::query::QueryResult;
use crate::statement::Statement;
use crate::value::{Row, Value};

use engine::MemoryState;

pub use document::{DocumentMemoryConfig, MemoryDocumentDialect};
pub use key_value::{KeyValueMemoryConfig, MemoryKeyValueDialect};

/// Configuration of [`MemoryDialect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Enforce primary, unique column and unique index constraints.
    pub enforce_unique: bool,
    /// Make `LIKE` case-sensitive. SQL engines disagree; the default is
    /// case-insensitive.
    pub case_sensitive_like: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enforce_unique: true,
            case_sensitive_like: false,
        }
    }
}

impl DialectConfig for MemoryConfig {}

/// Relational dialect backed by process memory.
#[derive(Debug)]
pub struct MemoryDialect {
    config: MemoryConfig,
    state: RwLock<MemoryState>,
    connected: AtomicBool,
}

impl Default for MemoryDialect {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl MemoryDialect {
    /// Registry name.
    pub const NAME: &'static str = "memory";

    /// Creates a disconnected dialect with no tables.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(MemoryState::default()),
            connected: AtomicBool::new(false),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn ensure_connected(&self) -> DbResult<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ExecutionError::NotConnected { dialect: Self::NAME }.into())
        }
    }

    fn reset(&self) -> DbResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("memory state"))?;
        *state = MemoryState::default();
        Ok(())
    }

    /// Executes a structured statement synchronously.
    pub fn execute(&self, statement: &Statement, params: &[Value]) -> DbResult<QueryResult> {
        self.ensure_connected()?;
        debug!(
            statement = statement.keyword(),
            table = statement.table(),
            params = params.len(),
            "memory execute"
        );
        if let Statement::Select(select) = statement {
            let state = self.state.read().map_err(|_| lock_err("memory state"))?;
            return state.select(select, params, &self.config);
        }
        let mut state = self.state.write().map_err(|_| lock_err("memory state"))?;
        state.apply(statement, params, &self.config)
    }

    /// Parses SQL text in the memory dialect's subset and executes it.
    /// `?` placeholders bind `params` in order.
    pub fn execute_sql(&self, sql: &str, params: &[Value]) -> DbResult<QueryResult> {
        let statement = sql::parse(sql)?;
        self.execute(&statement, params)
    }

    /// Rows of `table` whose indexed columns equal `key`.
    pub fn index_lookup(&self, table: &str, index: &str, key: &[Value]) -> DbResult<Vec<Row>> {
        self.ensure_connected()?;
        let state = self.state.read().map_err(|_| lock_err("memory state"))?;
        state.index_lookup(table, index, key)
    }

    /// Index names on `table`, sorted.
    pub fn index_names(&self, table: &str) -> DbResult<Vec<String>> {
        self.ensure_connected()?;
        let state = self.state.read().map_err(|_| lock_err("memory state"))?;
        state.index_names(table)
    }

    /// Names of every table, sorted.
    pub fn table_names(&self) -> DbResult<Vec<String>> {
        let state = self.state.read().map_err(|_| lock_err("memory state"))?;
        let mut names: Vec<String> = state.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl SqlFormatter for MemoryDialect {
    fn map_column_type(&self, column: &Column) -> String {
        match column.length {
            Some(len) => format!("{}({len})", column.column_type.name()),
            None => column.column_type.name().to_string(),
        }
    }

    /// The SQL front end reads backslash escapes, so backslashes are doubled
    /// along with single quotes.
    fn escape_string(&self, value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "''")
    }
}

#[async_trait]
impl Dialect for MemoryDialect {
    type Paradigm = Relational;
    type Config = MemoryConfig;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn from_config(config: MemoryConfig) -> DbResult<Self> {
        Ok(Self::new(config))
    }

    async fn connect(&self) -> DbResult<()> {
        self.reset()?;
        self.connected.store(true, Ordering::Release);
        debug!(dialect = Self::NAME, "connected");
        Ok(())
    }

    async fn disconnect(&self) -> DbResult<()> {
        self.reset()?;
        if self.connected.swap(false, Ordering::AcqRel) {
            debug!(dialect = Self::NAME, "disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn health_check(&self) -> DbResult<bool> {
        Ok(self.is_connected())
    }

    async fn dispose(&self) -> DbResult<()> {
        if !self.connected.swap(false, Ordering::AcqRel) {
            warn!(dialect = Self::NAME, "dispose called on a dialect that is not connected");
        }
        self.reset()
    }

    async fn query(&self, query: &Statement, params: &[Value]) -> DbResult<QueryResult> {
        self.execute(query, params)
    }
}
