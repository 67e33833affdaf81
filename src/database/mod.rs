//! Databases: a dialect plus the compiler of its paradigm.
//!
//! [`Database`] is generic over its dialect and compiles [`QueryParams`]
//! through the dialect's [`Paradigm`]. [`DatabaseHandle`] erases the
//! dialect type so the registry can hand out databases for any backend.

mod document;
mod key_value;
mod model;
mod relational;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::column::Schemas;
use crate::dialect::{Dialect, QueryOf};
use crate::error::{lock_err, DbResult};
use crate::query::{BuildQueryResult, QueryParams, QueryResult};

pub use document::{Document, DocumentFilter, DocumentOperation, DocumentQuery};
pub use key_value::{extract_key, KeyValue, KeyValueOperation, KeyValueQuery, DEFAULT_KEY};
pub use model::Model;
pub use relational::{compile_condition, Relational};

/// The three supported data models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParadigmKind {
    /// SQL tables.
    Relational,
    /// Document collections.
    Document,
    /// Key-value buckets.
    KeyValue,
}

impl fmt::Display for ParadigmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Relational => "relational",
            Self::Document => "document",
            Self::KeyValue => "key-value",
        })
    }
}

/// Compiles abstract queries into the representation one data model needs.
pub trait Paradigm: Send + Sync + 'static {
    /// Compiled query handed to the dialect.
    type Query: Clone + fmt::Debug + Send + Sync;

    const KIND: ParadigmKind;

    /// Whether [`Database::initialize`] creates every schema up front.
    /// Lazy paradigms materialize containers on first write.
    const EAGER_PROVISIONING: bool;

    /// Compiles one query. Total over [`QueryParams`].
    fn build_query(params: &QueryParams) -> DbResult<BuildQueryResult<Self::Query>>;
}

/// A dialect together with its provisioning schemas and model cache.
pub struct Database<D: Dialect> {
    dialect: Arc<D>,
    schemas: Schemas,
    models: RwLock<HashMap<String, Arc<Model<D>>>>,
}

impl<D: Dialect> fmt::Debug for Database<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect.name())
            .field("paradigm", &D::Paradigm::KIND)
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<D: Dialect> Database<D> {
    /// Wraps `dialect` with the given table schemas.
    #[must_use]
    pub fn new(dialect: D, schemas: Schemas) -> Self {
        Self {
            dialect: Arc::new(dialect),
            schemas,
            models: RwLock::new(HashMap::new()),
        }
    }

    /// The underlying dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Declared schemas.
    #[must_use]
    pub const fn schemas(&self) -> &Schemas {
        &self.schemas
    }

    /// Compiles `params` for this database's dialect.
    pub fn build_query(&self, params: &QueryParams) -> DbResult<BuildQueryResult<QueryOf<D>>> {
        D::Paradigm::build_query(params)
    }

    /// Compiles and executes `params`.
    pub async fn execute(&self, params: &QueryParams) -> DbResult<QueryResult> {
        execute_on(self.dialect.as_ref(), params).await
    }

    /// Connects if needed, then provisions every schema when the paradigm
    /// is eager.
    pub async fn initialize(&self) -> DbResult<()> {
        if !self.dialect.is_connected() {
            self.dialect.connect().await?;
        }
        if !D::Paradigm::EAGER_PROVISIONING {
            debug!(
                dialect = self.dialect.name(),
                paradigm = %D::Paradigm::KIND,
                "lazy provisioning; skipping schema creation"
            );
            return Ok(());
        }
        for (table_name, schema) in &self.schemas {
            debug!(dialect = self.dialect.name(), table = %table_name, "provisioning table");
            self.execute(&QueryParams::Create {
                table_name: table_name.clone(),
                schema: schema.clone(),
            })
            .await?;
        }
        Ok(())
    }

    /// Returns the cached model for `name`, creating it on first use.
    pub fn model(&self, name: &str) -> DbResult<Arc<Model<D>>> {
        {
            let models = self.models.read().map_err(|_| lock_err("models"))?;
            if let Some(model) = models.get(name) {
                return Ok(Arc::clone(model));
            }
        }
        let mut models = self.models.write().map_err(|_| lock_err("models"))?;
        let model = models
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Model::new(name, Arc::clone(&self.dialect))));
        Ok(Arc::clone(model))
    }
}

pub(crate) async fn execute_on<D: Dialect>(dialect: &D, params: &QueryParams) -> DbResult<QueryResult> {
    let built = D::Paradigm::build_query(params)?;
    debug!(
        dialect = dialect.name(),
        kind = params.kind(),
        table = params.table_name(),
        params = built.params.len(),
        "executing query"
    );
    dialect.query(&built.query, &built.params).await
}

/// Dialect-erased view of a [`Database`].
#[async_trait]
pub trait DatabaseHandle: Send + Sync + fmt::Debug {
    fn dialect_name(&self) -> &'static str;

    fn paradigm(&self) -> ParadigmKind;

    fn schemas(&self) -> &Schemas;

    async fn connect(&self) -> DbResult<()>;

    async fn disconnect(&self) -> DbResult<()>;

    fn is_connected(&self) -> bool;

    async fn initialize(&self) -> DbResult<()>;

    async fn execute(&self, params: &QueryParams) -> DbResult<QueryResult>;

    async fn health_check(&self) -> DbResult<bool>;

    async fn dispose(&self) -> DbResult<()>;

    /// Downcast hook back to the concrete `Database<D>`.
    fn as_any(&self) -> &dyn Any;
}

impl dyn DatabaseHandle {
    /// Returns the concrete database if it wraps dialect `D`.
    #[must_use]
    pub fn downcast_ref<D: Dialect>(&self) -> Option<&Database<D>> {
        self.as_any().downcast_ref::<Database<D>>()
    }
}

#[async_trait]
impl<D: Dialect> DatabaseHandle for Database<D> {
    fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    fn paradigm(&self) -> ParadigmKind {
        D::Paradigm::KIND
    }

    fn schemas(&self) -> &Schemas {
        &self.schemas
    }

    async fn connect(&self) -> DbResult<()> {
        self.dialect.connect().await
    }

    async fn disconnect(&self) -> DbResult<()> {
        self.dialect.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.dialect.is_connected()
    }

    async fn initialize(&self) -> DbResult<()> {
        Database::initialize(self).await
    }

    async fn execute(&self, params: &QueryParams) -> DbResult<QueryResult> {
        Database::execute(self, params).await
    }

    async fn health_check(&self) -> DbResult<bool> {
        self.dialect.health_check().await
    }

    async fn dispose(&self) -> DbResult<()> {
        self.dialect.dispose().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
