//! Dialect registry.
//!
//! Maps a dialect name to a way of building it. Registration says
//! explicitly whether the entry is the dialect's own typed
//! [`Dialect::from_config`] ([`RegisterAs::Constructor`]) or an arbitrary
//! closure ([`RegisterAs::Factory`]). Either way the registry hands back a
//! type-erased [`DatabaseHandle`].
//!
//! # Examples
//!
//! ```
//! use dialectdb::{MemoryConfig, Registry, Schemas};
//!
//! let registry = Registry::with_defaults();
//! let db = registry.create("memory", MemoryConfig::default(), Schemas::new()).unwrap();
//! assert_eq!(db.dialect_name(), "memory");
//! ```

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::column::Schemas;
use crate::database::{Database, DatabaseHandle};
use crate::dialect::{Dialect, DialectConfig};
use crate::error::{lock_err, DbResult, RegistryError};
use crate::memory::{MemoryDialect, MemoryDocumentDialect, MemoryKeyValueDialect};

type ErasedConfig = Box<dyn Any + Send + Sync>;
type BuildFn = dyn Fn(&str, ErasedConfig, Schemas) -> DbResult<Arc<dyn DatabaseHandle>> + Send + Sync;
type ParseFn = dyn Fn(&str, serde_json::Value) -> DbResult<ErasedConfig> + Send + Sync;

/// Type-erased recipe for one dialect.
#[derive(Clone)]
pub struct Builder {
    config_type: &'static str,
    build: Arc<BuildFn>,
    parse: Arc<ParseFn>,
}

impl Builder {
    fn new<C, D, F>(make: F) -> Self
    where
        C: DialectConfig + DeserializeOwned,
        D: Dialect,
        F: Fn(C) -> DbResult<D> + Send + Sync + 'static,
    {
        let build = move |name: &str, config: ErasedConfig, schemas: Schemas| -> DbResult<Arc<dyn DatabaseHandle>> {
            let config = config.downcast::<C>().map_err(|_| RegistryError::ConfigMismatch {
                name: name.to_string(),
                expected: type_name::<C>(),
            })?;
            let dialect = make(*config)?;
            Ok(Arc::new(Database::new(dialect, schemas)) as Arc<dyn DatabaseHandle>)
        };
        let parse = |name: &str, json: serde_json::Value| -> DbResult<ErasedConfig> {
            let config: C = serde_json::from_value(json).map_err(|e| RegistryError::InvalidConfig {
                name: name.to_string(),
                message: e.to_string(),
            })?;
            Ok(Box::new(config) as ErasedConfig)
        };
        Self {
            config_type: type_name::<C>(),
            build: Arc::new(build),
            parse: Arc::new(parse),
        }
    }

    /// Name of the config type this entry accepts.
    #[must_use]
    pub const fn config_type(&self) -> &'static str {
        self.config_type
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("config_type", &self.config_type)
            .finish_non_exhaustive()
    }
}

/// How a dialect is registered.
#[derive(Debug, Clone)]
pub enum RegisterAs {
    /// The dialect's own [`Dialect::from_config`].
    Constructor(Builder),
    /// A closure producing the dialect from a typed config.
    Factory(Builder),
}

impl RegisterAs {
    /// Registers `D` through [`Dialect::from_config`].
    #[must_use]
    pub fn constructor<D>() -> Self
    where
        D: Dialect,
        D::Config: DeserializeOwned,
    {
        Self::Constructor(Builder::new::<D::Config, D, _>(D::from_config))
    }

    /// Registers a factory closure.
    #[must_use]
    pub fn factory<C, D, F>(make: F) -> Self
    where
        C: DialectConfig + DeserializeOwned,
        D: Dialect,
        F: Fn(C) -> DbResult<D> + Send + Sync + 'static,
    {
        Self::Factory(Builder::new(make))
    }

    const fn builder(&self) -> &Builder {
        match self {
            Self::Constructor(builder) | Self::Factory(builder) => builder,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Constructor(_) => "constructor",
            Self::Factory(_) => "factory",
        }
    }
}

/// Name to dialect map.
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, RegisterAs>>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the three in-memory dialects under `memory`,
    /// `memory-document` and `memory-kv`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            MemoryDialect::NAME.to_string(),
            RegisterAs::constructor::<MemoryDialect>(),
        );
        entries.insert(
            MemoryDocumentDialect::NAME.to_string(),
            RegisterAs::constructor::<MemoryDocumentDialect>(),
        );
        entries.insert(
            MemoryKeyValueDialect::NAME.to_string(),
            RegisterAs::constructor::<MemoryKeyValueDialect>(),
        );
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Registers `name`, replacing any earlier entry.
    pub fn register(&self, name: impl Into<String>, entry: RegisterAs) -> DbResult<()> {
        let name = name.into();
        debug!(dialect = %name, kind = entry.kind(), config = entry.builder().config_type(), "registering dialect");
        let mut entries = self.entries.write().map_err(|_| lock_err("registry"))?;
        if entries.insert(name.clone(), entry).is_some() {
            debug!(dialect = %name, "replaced existing registration");
        }
        Ok(())
    }

    /// True if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().is_ok_and(|entries| entries.contains_key(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> DbResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| lock_err("registry"))?;
        let mut names: Vec<String> = entries.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn builder(&self, name: &str) -> DbResult<Builder> {
        let entries = self.entries.read().map_err(|_| lock_err("registry"))?;
        entries
            .get(name)
            .map(|entry| entry.builder().clone())
            .ok_or_else(|| {
                RegistryError::NotRegistered {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Builds an unconnected database for dialect `name`.
    ///
    /// `config` must be exactly the config type the dialect was registered
    /// with; anything else is [`RegistryError::ConfigMismatch`].
    pub fn create<C: DialectConfig>(
        &self,
        name: &str,
        config: C,
        schemas: Schemas,
    ) -> DbResult<Arc<dyn DatabaseHandle>> {
        let builder = self.builder(name)?;
        debug!(dialect = name, tables = schemas.len(), "creating database");
        (builder.build)(name, Box::new(config), schemas)
    }

    /// Like [`Registry::create`], deserializing the config from JSON.
    pub fn create_from_json(
        &self,
        name: &str,
        config: serde_json::Value,
        schemas: Schemas,
    ) -> DbResult<Arc<dyn DatabaseHandle>> {
        let builder = self.builder(name)?;
        let config = (builder.parse)(name, config)?;
        debug!(dialect = name, tables = schemas.len(), "creating database from json config");
        (builder.build)(name, config, schemas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ParadigmKind;
    use crate::memory::{KeyValueMemoryConfig, MemoryConfig};

    #[test]
    fn test_defaults_are_registered() {
        let registry = Registry::with_defaults();
        assert_eq!(
            registry.names().unwrap(),
            vec!["memory".to_string(), "memory-document".into(), "memory-kv".into()]
        );
        assert!(!Registry::new().contains("memory"));
    }

    #[test]
    fn test_unknown_dialect() {
        let err = Registry::with_defaults()
            .create("oracle", MemoryConfig::default(), Schemas::new())
            .unwrap_err();
        assert!(err.is_registry());
        assert_eq!(err.to_string(), "dialect oracle not registered");
    }

    #[test]
    fn test_config_type_must_match() {
        let err = Registry::with_defaults()
            .create("memory", KeyValueMemoryConfig::default(), Schemas::new())
            .unwrap_err();
        assert!(err.to_string().contains("MemoryConfig"));
    }

    #[test]
    fn test_create_from_json() {
        let registry = Registry::with_defaults();
        let db = registry
            .create_from_json(
                "memory",
                serde_json::json!({"case_sensitive_like": true}),
                Schemas::new(),
            )
            .unwrap();
        let db = db.downcast_ref::<MemoryDialect>().unwrap();
        assert!(db.dialect().config().case_sensitive_like);
        assert!(db.dialect().config().enforce_unique);

        let err = registry
            .create_from_json("memory", serde_json::json!({"enforce_unique": "yes"}), Schemas::new())
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid config for dialect memory"));
    }

    #[test]
    fn test_factory_registration() {
        let registry = Registry::new();
        registry
            .register(
                "strict-kv",
                RegisterAs::factory(|mut config: KeyValueMemoryConfig| {
                    config.max_entries_per_bucket.get_or_insert(8);
                    Ok(MemoryKeyValueDialect::new(config))
                }),
            )
            .unwrap();
        let db = registry
            .create("strict-kv", KeyValueMemoryConfig::default(), Schemas::new())
            .unwrap();
        assert_eq!(db.paradigm(), ParadigmKind::KeyValue);
        assert_eq!(db.dialect_name(), "memory-kv");
    }
}
