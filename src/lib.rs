//! # dialectdb - one query algebra over many backends
//!
//! dialectdb separates *what* a caller asks for from *how* a backend
//! executes it. Callers describe work as [`QueryParams`] (create, select,
//! insert, update, delete, alter, drop, index) with a Mongo-style
//! [`Condition`] language. A [`Database`] compiles those through the
//! [`Paradigm`] of its [`Dialect`] and hands the result to the dialect.
//!
//! ## Core Concepts
//!
//! - **Paradigm**: relational ([`Statement`]), document ([`DocumentQuery`])
//!   or key-value ([`KeyValueQuery`]) compiled form
//! - **Dialect**: connection lifecycle plus execution of one compiled form;
//!   SQL dialects also choose tokens through [`SqlFormatter`]
//! - **Registry**: name to dialect map returning type-erased databases
//! - **Memory dialects**: volatile reference engines for all three paradigms
//!
//! ## Usage
//!
//! ```rust
//! use dialectdb::{row, Column, Condition, MemoryConfig, MemoryDialect, Database, Schemas, TableSchema};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let mut schemas = Schemas::new();
//! schemas.insert(
//!     "users".into(),
//!     TableSchema::new()
//!         .column("id", Column::integer().primary().auto_increment())
//!         .column("name", Column::text()),
//! );
//!
//! let db = Database::new(MemoryDialect::new(MemoryConfig::default()), schemas);
//! db.initialize().await?;
//!
//! let users = db.model("users")?;
//! users.create(row! { "name" => "ada" }).await?;
//! let found = users.find_one(Condition::new().eq("name", "ada")).await?;
//! assert_eq!(found.and_then(|r| r.get("id").cloned()), Some(1.into()));
//! # Ok::<(), dialectdb::DbError>(())
//! # }).unwrap();
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod column;
pub mod condition;
pub mod database;
pub mod dialect;
pub mod error;
pub mod memory;
pub mod query;
pub mod registry;
pub mod statement;
pub mod value;

pub use column::{Column, ColumnDef, ColumnType, Schemas, TableSchema};
pub use condition::{Clause, Condition, FieldCondition, Operator};
pub use database::{
    Database, DatabaseHandle, Document, DocumentFilter, DocumentOperation, DocumentQuery, KeyValue,
    KeyValueOperation, KeyValueQuery, Model, Paradigm, ParadigmKind, Relational,
};
pub use dialect::{AnsiFormatter, Dialect, DialectConfig, QueryOf, SqlFormatter};
pub use error::{DbError, DbResult, ExecutionError, RegistryError, SyntaxError};
pub use memory::{
    DocumentMemoryConfig, KeyValueMemoryConfig, MemoryConfig, MemoryDialect, MemoryDocumentDialect,
    MemoryKeyValueDialect,
};
pub use query::{
    Alteration, BuildQueryResult, Ordering, QueryParams, QueryResult, SelectParams, SortDirection,
};
pub use registry::{RegisterAs, Registry};
pub use statement::{CompareOp, Operand, Predicate, Select, Statement};
pub use value::{Row, Value};
