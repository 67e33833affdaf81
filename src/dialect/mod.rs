//! The backend contract.
//!
//! A [`Dialect`] owns one connection to a backend and executes queries in
//! the compiled form of its [`Paradigm`]. SQL-producing dialects also
//! implement [`SqlFormatter`] so generic statement assembly can pick their
//! tokens.

mod format;

use std::any::Any;
use std::fmt;

use async_trait::async_trait;

use crate::database::Paradigm;
use crate::error::DbResult;
use crate::query::QueryResult;
use crate::value::Value;

pub use format::{AnsiFormatter, SqlFormatter};

/// Marker for the concrete configuration type of one dialect.
///
/// The registry erases configs to `dyn Any` and downcasts them back, so a
/// config is rejected if it is not exactly the type the dialect expects.
pub trait DialectConfig: Any + Send + Sync + fmt::Debug {}

/// Compiled query type accepted by dialect `D`.
pub type QueryOf<D> = <<D as Dialect>::Paradigm as Paradigm>::Query;

/// Connection lifecycle plus query execution for one backend.
///
/// `disconnect` and `dispose` must be idempotent.
#[async_trait]
pub trait Dialect: Send + Sync + 'static {
    /// Data model this dialect speaks.
    type Paradigm: Paradigm;

    /// Backend-specific configuration.
    type Config: DialectConfig;

    /// Registry name, e.g. `"memory"`.
    fn name(&self) -> &'static str;

    /// Builds an unconnected dialect from its configuration.
    fn from_config(config: Self::Config) -> DbResult<Self>
    where
        Self: Sized;

    async fn connect(&self) -> DbResult<()>;

    async fn disconnect(&self) -> DbResult<()>;

    fn is_connected(&self) -> bool;

    /// Cheap liveness check. Returns `false` rather than failing when the
    /// backend is unreachable.
    async fn health_check(&self) -> DbResult<bool>;

    /// Releases every resource held by the dialect.
    async fn dispose(&self) -> DbResult<()>;

    /// Executes one compiled query with its positional parameters.
    async fn query(&self, query: &QueryOf<Self>, params: &[Value]) -> DbResult<QueryResult>;
}
