//! In-memory document dialect.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::{Document, DocumentFilter, DocumentOperation, DocumentQuery};
use crate::dialect::{Dialect, DialectConfig};
use crate::error::{lock_err, DbResult, ExecutionError};
use crate::memory::eval::operator_matches;
use crate::query::{Alteration, Ordering, QueryResult, SortDirection};
use crate::value::{Row, Value};

use super::table::{check_distinct, Index};

/// Configuration of [`MemoryDocumentDialect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMemoryConfig {
    /// Field that receives a generated UUID when an inserted document has
    /// none.
    pub id_field: String,
    /// Make `$like` case-sensitive.
    pub case_sensitive_like: bool,
}

impl Default for DocumentMemoryConfig {
    fn default() -> Self {
        Self {
            id_field: "_id".to_string(),
            case_sensitive_like: false,
        }
    }
}

impl DialectConfig for DocumentMemoryConfig {}

#[derive(Debug, Clone, Default)]
struct Collection {
    documents: Vec<Row>,
    indexes: BTreeMap<String, Index>,
}

impl Collection {
    fn reindex(&mut self) {
        for index in self.indexes.values_mut() {
            *index = Index::build(std::mem::take(&mut index.columns), index.unique, &self.documents);
        }
    }

    fn check_unique(&self, name: &str) -> DbResult<()> {
        for (index_name, index) in self.indexes.iter().filter(|(_, i)| i.unique) {
            check_distinct(&index.columns, &self.documents).map_err(|key| ExecutionError::ConstraintViolation {
                table: name.to_string(),
                message: format!("duplicate value '{key}' for unique index {index_name}"),
            })?;
        }
        Ok(())
    }
}

/// Document dialect backed by process memory.
///
/// Collections are created on first insert (or by an explicit
/// `CreateCollection`). Reads and writes against a collection that does not
/// exist fail with [`ExecutionError::CollectionNotFound`]; dropping one is
/// idempotent. Indexes cover top-level fields only.
#[derive(Debug)]
pub struct MemoryDocumentDialect {
    config: DocumentMemoryConfig,
    collections: RwLock<HashMap<String, Collection>>,
    connected: AtomicBool,
}

impl Default for MemoryDocumentDialect {
    fn default() -> Self {
        Self::new(DocumentMemoryConfig::default())
    }
}

/// Reads a possibly dotted field path. Segments after the first descend into
/// JSON objects. Missing fields read as `NULL`.
fn lookup_path(document: &Row, path: &str) -> Value {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return Value::Null;
    };
    let Some(mut current) = document.get(first).cloned() else {
        return Value::Null;
    };
    for segment in segments {
        current = match current {
            Value::Json(serde_json::Value::Object(map)) => match map.get(segment) {
                Some(v) => Value::from_json(v.clone()),
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current
}

fn filter_matches(filter: &DocumentFilter, document: &Row, case_sensitive: bool) -> DbResult<bool> {
    Ok(match filter {
        DocumentFilter::All => true,
        DocumentFilter::Field { field, ops } => {
            let actual = lookup_path(document, field);
            for (op, operand) in ops {
                if !operator_matches(*op, &actual, operand, case_sensitive)? {
                    return Ok(false);
                }
            }
            true
        }
        DocumentFilter::And(parts) => {
            for part in parts {
                if !filter_matches(part, document, case_sensitive)? {
                    return Ok(false);
                }
            }
            true
        }
        DocumentFilter::Or(parts) => {
            for part in parts {
                if filter_matches(part, document, case_sensitive)? {
                    return Ok(true);
                }
            }
            false
        }
        DocumentFilter::Not(inner) => !filter_matches(inner, document, case_sensitive)?,
    })
}

fn group_key(document: &Row, fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| lookup_path(document, f).key_string())
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

fn sort_documents(documents: &mut [Row], sort: &[Ordering]) {
    documents.sort_by(|a, b| {
        for ordering in sort {
            let cmp = lookup_path(a, &ordering.field).sort_cmp(&lookup_path(b, &ordering.field));
            let cmp = match ordering.direction {
                SortDirection::Asc => cmp,
                SortDirection::Desc => cmp.reverse(),
            };
            if cmp.is_ne() {
                return cmp;
            }
        }
        std::cmp::Ordering::Equal
    });
}

impl MemoryDocumentDialect {
    /// Registry name.
    pub const NAME: &'static str = "memory-document";

    /// Creates a disconnected dialect with no collections.
    #[must_use]
    pub fn new(config: DocumentMemoryConfig) -> Self {
        Self {
            config,
            collections: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(false),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &DocumentMemoryConfig {
        &self.config
    }

    fn reset(&self) -> DbResult<()> {
        self.collections
            .write()
            .map_err(|_| lock_err("document collections"))?
            .clear();
        Ok(())
    }

    /// Names of every collection, sorted.
    pub fn collection_names(&self) -> DbResult<Vec<String>> {
        let collections = self.collections.read().map_err(|_| lock_err("document collections"))?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Executes one compiled document query.
    pub fn execute(&self, query: &DocumentQuery) -> DbResult<QueryResult> {
        if !self.connected.load(AtomicOrdering::Acquire) {
            return Err(ExecutionError::NotConnected { dialect: Self::NAME }.into());
        }
        let name = query.collection.as_str();
        debug!(collection = name, "memory-document execute");

        if let DocumentOperation::Find {
            filter,
            projection,
            sort,
            group_by,
            skip,
            limit,
        } = &query.operation
        {
            let collections = self.collections.read().map_err(|_| lock_err("document collections"))?;
            let collection = collections.get(name).ok_or_else(|| not_found(name))?;
            return self.find(collection, filter, projection, sort, group_by, *skip, *limit);
        }

        let mut collections = self.collections.write().map_err(|_| lock_err("document collections"))?;
        match &query.operation {
            DocumentOperation::Find { .. } => Err(crate::error::DbError::internal("find reached the write path")),
            DocumentOperation::CreateCollection { .. } => {
                collections.entry(name.to_string()).or_default();
                Ok(QueryResult::ack())
            }
            DocumentOperation::InsertOne { document } => {
                let collection = collections.entry(name.to_string()).or_default();
                self.insert(name, collection, document.clone())
            }
            DocumentOperation::UpdateMany { filter, set } => {
                let collection = collections.get_mut(name).ok_or_else(|| not_found(name))?;
                self.update(name, collection, filter, set)
            }
            DocumentOperation::DeleteMany { filter } => {
                let collection = collections.get_mut(name).ok_or_else(|| not_found(name))?;
                let mut keep = Vec::with_capacity(collection.documents.len());
                for document in &collection.documents {
                    keep.push(!filter_matches(filter, document, self.config.case_sensitive_like)?);
                }
                let before = collection.documents.len();
                let mut flags = keep.into_iter();
                collection.documents.retain(|_| flags.next().unwrap_or(true));
                collection.reindex();
                Ok(QueryResult::affected((before - collection.documents.len()) as u64))
            }
            DocumentOperation::Alter { alterations } => {
                let collection = collections.get_mut(name).ok_or_else(|| not_found(name))?;
                alter(collection, alterations)
            }
            DocumentOperation::DropCollection => {
                if collections.remove(name).is_none() {
                    debug!(collection = name, "drop of missing collection ignored");
                }
                Ok(QueryResult::ack())
            }
            DocumentOperation::CreateIndex {
                name: index_name,
                fields,
                unique,
            } => {
                let collection = collections.entry(name.to_string()).or_default();
                if collection.indexes.contains_key(index_name) {
                    return Ok(QueryResult::ack());
                }
                let index = Index::build(fields.clone(), *unique, &collection.documents);
                let mut next = collection.clone();
                next.indexes.insert(index_name.clone(), index);
                next.check_unique(name)?;
                *collection = next;
                Ok(QueryResult::ack())
            }
            DocumentOperation::DropIndex { name: index_name } => {
                if let Some(collection) = collections.get_mut(name) {
                    collection.indexes.remove(index_name);
                }
                Ok(QueryResult::ack())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn find(
        &self,
        collection: &Collection,
        filter: &DocumentFilter,
        projection: &[String],
        sort: &[Ordering],
        group_by: &[String],
        skip: Option<u64>,
        limit: Option<u64>,
    ) -> DbResult<QueryResult> {
        let mut hits = Vec::new();
        for document in &collection.documents {
            if filter_matches(filter, document, self.config.case_sensitive_like)? {
                hits.push(document.clone());
            }
        }

        if !group_by.is_empty() {
            let mut seen = HashSet::new();
            hits.retain(|d| seen.insert(group_key(d, group_by)));
        }
        if !sort.is_empty() {
            sort_documents(&mut hits, sort);
        }

        let skip = usize::try_from(skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let rows = hits
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| {
                if projection.is_empty() {
                    document
                } else {
                    projection
                        .iter()
                        .filter_map(|f| {
                            let value = lookup_path(&document, f);
                            (!value.is_null() || document.contains_key(f)).then(|| (f.clone(), value))
                        })
                        .collect()
                }
            })
            .collect();
        Ok(QueryResult::with_rows(rows))
    }

    fn insert(&self, name: &str, collection: &mut Collection, mut document: Row) -> DbResult<QueryResult> {
        let id_field = &self.config.id_field;
        if document.get(id_field).map_or(true, Value::is_null) {
            document.insert(id_field.clone(), Value::Text(Uuid::new_v4().to_string()));
        }
        let id = document.get(id_field).cloned();

        collection.documents.push(document);
        if let Err(e) = collection.check_unique(name) {
            collection.documents.pop();
            return Err(e);
        }
        let pos = collection.documents.len() - 1;
        for index in collection.indexes.values_mut() {
            index.add(pos, &collection.documents[pos]);
        }
        Ok(QueryResult {
            affected_rows: 1,
            insert_id: id,
            ..QueryResult::default()
        })
    }

    fn update(
        &self,
        name: &str,
        collection: &mut Collection,
        filter: &DocumentFilter,
        set: &Row,
    ) -> DbResult<QueryResult> {
        let mut next = collection.clone();
        let mut affected = 0u64;
        for document in &mut next.documents {
            if filter_matches(filter, document, self.config.case_sensitive_like)? {
                for (field, value) in set {
                    document.insert(field.clone(), value.clone());
                }
                affected += 1;
            }
        }
        next.check_unique(name)?;
        next.reindex();
        *collection = next;
        Ok(QueryResult::affected(affected))
    }
}

fn not_found(name: &str) -> crate::error::DbError {
    ExecutionError::CollectionNotFound {
        collection: name.to_string(),
    }
    .into()
}

/// Documents are schemaless: `Add` fills a default where one is given,
/// `Drop` strips the field, `Modify` coerces present values.
fn alter(collection: &mut Collection, alterations: &[Alteration]) -> DbResult<QueryResult> {
    let mut next = collection.clone();
    for alteration in alterations {
        match alteration {
            Alteration::Add { name, column } => {
                if let Some(default) = &column.default {
                    for document in &mut next.documents {
                        document.entry(name.clone()).or_insert_with(|| default.clone());
                    }
                }
            }
            Alteration::Drop { name } => {
                for document in &mut next.documents {
                    document.remove(name);
                }
                next.indexes.retain(|_, index| !index.columns.contains(name));
            }
            Alteration::Modify { name, column } => {
                for document in &mut next.documents {
                    if let Some(value) = document.remove(name) {
                        document.insert(name.clone(), column.column_type.coerce(name, value)?);
                    }
                }
            }
        }
    }
    next.reindex();
    *collection = next;
    Ok(QueryResult::ack())
}

#[async_trait]
impl Dialect for MemoryDocumentDialect {
    type Paradigm = Document;
    type Config = DocumentMemoryConfig;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn from_config(config: DocumentMemoryConfig) -> DbResult<Self> {
        Ok(Self::new(config))
    }

    async fn connect(&self) -> DbResult<()> {
        self.reset()?;
        self.connected.store(true, AtomicOrdering::Release);
        debug!(dialect = Self::NAME, "connected");
        Ok(())
    }

    async fn disconnect(&self) -> DbResult<()> {
        self.reset()?;
        if self.connected.swap(false, AtomicOrdering::AcqRel) {
            debug!(dialect = Self::NAME, "disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(AtomicOrdering::Acquire)
    }

    async fn health_check(&self) -> DbResult<bool> {
        Ok(self.is_connected())
    }

    async fn dispose(&self) -> DbResult<()> {
        if !self.connected.swap(false, AtomicOrdering::AcqRel) {
            warn!(dialect = Self::NAME, "dispose called on a dialect that is not connected");
        }
        self.reset()
    }

    async fn query(&self, query: &DocumentQuery, _params: &[Value]) -> DbResult<QueryResult> {
        self.execute(query)
    }
}
