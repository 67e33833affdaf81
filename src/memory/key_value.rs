//! In-memory key-value dialect.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::database::{KeyValue, KeyValueOperation, KeyValueQuery};
use crate::dialect::{Dialect, DialectConfig};
use crate::error::{lock_err, DbResult, ExecutionError};
use crate::query::QueryResult;
use crate::value::{Row, Value};

/// Configuration of [`MemoryKeyValueDialect`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValueMemoryConfig {
    /// Upper bound on entries per bucket; a `Set` of a new key beyond it is
    /// a constraint violation. `None` means unbounded.
    pub max_entries_per_bucket: Option<usize>,
}

impl DialectConfig for KeyValueMemoryConfig {}

type Bucket = BTreeMap<String, Row>;

/// Key-value dialect backed by process memory. Buckets are created by the
/// first `Set`.
#[derive(Debug)]
pub struct MemoryKeyValueDialect {
    config: KeyValueMemoryConfig,
    buckets: RwLock<HashMap<String, Bucket>>,
    connected: AtomicBool,
}

impl Default for MemoryKeyValueDialect {
    fn default() -> Self {
        Self::new(KeyValueMemoryConfig::default())
    }
}

fn bucket_not_found(bucket: &str) -> crate::error::DbError {
    ExecutionError::BucketNotFound {
        bucket: bucket.to_string(),
    }
    .into()
}

impl MemoryKeyValueDialect {
    /// Registry name.
    pub const NAME: &'static str = "memory-kv";

    /// Creates a disconnected dialect with no buckets.
    #[must_use]
    pub fn new(config: KeyValueMemoryConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(false),
        }
    }

    fn reset(&self) -> DbResult<()> {
        self.buckets.write().map_err(|_| lock_err("key-value buckets"))?.clear();
        Ok(())
    }

    /// Number of entries in `bucket`.
    pub fn entry_count(&self, bucket: &str) -> DbResult<usize> {
        let buckets = self.buckets.read().map_err(|_| lock_err("key-value buckets"))?;
        buckets.get(bucket).map(BTreeMap::len).ok_or_else(|| bucket_not_found(bucket))
    }

    /// Executes one compiled key-value query.
    pub fn execute(&self, query: &KeyValueQuery) -> DbResult<QueryResult> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(ExecutionError::NotConnected { dialect: Self::NAME }.into());
        }
        let name = query.bucket.as_str();
        debug!(bucket = name, "memory-kv execute");

        if let KeyValueOperation::Get { key, fields } = &query.operation {
            let buckets = self.buckets.read().map_err(|_| lock_err("key-value buckets"))?;
            let bucket = buckets.get(name).ok_or_else(|| bucket_not_found(name))?;
            let rows = bucket
                .get(key)
                .map(|entry| {
                    if fields.is_empty() {
                        entry.clone()
                    } else {
                        entry
                            .iter()
                            .filter(|(field, _)| fields.contains(*field))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect()
                    }
                })
                .into_iter()
                .collect();
            return Ok(QueryResult::with_rows(rows));
        }

        let mut buckets = self.buckets.write().map_err(|_| lock_err("key-value buckets"))?;
        match &query.operation {
            KeyValueOperation::CreateBucket => {
                buckets.entry(name.to_string()).or_default();
                Ok(QueryResult::ack())
            }
            KeyValueOperation::Set { key, value } => {
                let bucket = buckets.entry(name.to_string()).or_default();
                if let Some(max) = self.config.max_entries_per_bucket {
                    if !bucket.contains_key(key) && bucket.len() >= max {
                        return Err(ExecutionError::ConstraintViolation {
                            table: name.to_string(),
                            message: format!("bucket is full ({max} entries)"),
                        }
                        .into());
                    }
                }
                bucket.insert(key.clone(), value.clone());
                Ok(QueryResult {
                    affected_rows: 1,
                    insert_id: Some(Value::Text(key.clone())),
                    ..QueryResult::default()
                })
            }
            KeyValueOperation::Merge { key, patch } => {
                let bucket = buckets.get_mut(name).ok_or_else(|| bucket_not_found(name))?;
                match bucket.get_mut(key) {
                    Some(entry) => {
                        entry.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
                        Ok(QueryResult::affected(1))
                    }
                    None => Ok(QueryResult::affected(0)),
                }
            }
            KeyValueOperation::Delete { key } => {
                let bucket = buckets.get_mut(name).ok_or_else(|| bucket_not_found(name))?;
                Ok(QueryResult::affected(u64::from(bucket.remove(key).is_some())))
            }
            KeyValueOperation::DropBucket => {
                buckets.remove(name);
                Ok(QueryResult::ack())
            }
            KeyValueOperation::Noop | KeyValueOperation::Get { .. } => Ok(QueryResult::ack()),
        }
    }
}

#[async_trait]
impl Dialect for MemoryKeyValueDialect {
    type Paradigm = KeyValue;
    type Config = KeyValueMemoryConfig;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn from_config(config: KeyValueMemoryConfig) -> DbResult<Self> {
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

    async fn query(&self, query: &KeyValueQuery, _params: &[Value]) -> DbResult<QueryResult> {
        self.execute(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    fn kv(operation: KeyValueOperation) -> KeyValueQuery {
        KeyValueQuery {
            bucket: "sessions".into(),
            operation,
        }
    }

    async fn connected(config: KeyValueMemoryConfig) -> MemoryKeyValueDialect {
        let dialect = MemoryKeyValueDialect::new(config);
        dialect.connect().await.unwrap();
        dialect
    }

    #[tokio::test]
    async fn test_set_get_merge_delete() {
        let dialect = connected(KeyValueMemoryConfig::default()).await;
        dialect
            .execute(&kv(KeyValueOperation::Set {
                key: "s1".into(),
                value: row! { "user" => "ada", "hits" => 1 },
            }))
            .unwrap();
        let merged = dialect
            .execute(&kv(KeyValueOperation::Merge {
                key: "s1".into(),
                patch: row! { "hits" => 2 },
            }))
            .unwrap();
        assert_eq!(merged.affected_rows, 1);

        let got = dialect
            .execute(&kv(KeyValueOperation::Get {
                key: "s1".into(),
                fields: vec!["hits".into()],
            }))
            .unwrap();
        assert_eq!(got.rows, vec![row! { "hits" => 2 }]);

        let deleted = dialect.execute(&kv(KeyValueOperation::Delete { key: "s1".into() })).unwrap();
        assert_eq!(deleted.affected_rows, 1);
        let missing = dialect
            .execute(&kv(KeyValueOperation::Get {
                key: "s1".into(),
                fields: vec![],
            }))
            .unwrap();
        assert!(missing.rows.is_empty());
    }

    #[tokio::test]
    async fn test_missing_bucket_errors() {
        let dialect = connected(KeyValueMemoryConfig::default()).await;
        let err = dialect
            .execute(&kv(KeyValueOperation::Delete { key: "x".into() }))
            .unwrap_err();
        assert!(err.is_not_found());
        dialect.execute(&kv(KeyValueOperation::DropBucket)).unwrap();
        dialect.execute(&kv(KeyValueOperation::CreateBucket)).unwrap();
        assert_eq!(dialect.entry_count("sessions").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bucket_capacity() {
        let dialect = connected(KeyValueMemoryConfig {
            max_entries_per_bucket: Some(1),
        })
        .await;
        let set = |key: &str| {
            kv(KeyValueOperation::Set {
                key: key.into(),
                value: row! { "v" => 1 },
            })
        };
        dialect.execute(&set("a")).unwrap();
        dialect.execute(&set("a")).unwrap();
        assert!(dialect.execute(&set("b")).is_err());
    }
}
