use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::catalog::Catalog;
use super::error::{Result, StorageError};
use super::source::{Scan, TableSource};
use super::table::Schema;
use crate::spectql::ast::{FilterExpr, ResourcePath};

type SchemaMap = HashMap<String, Arc<Schema>>;

/// A resource path bound to its source and schema.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub path: ResourcePath,
    pub schema: Arc<Schema>,
    pub source: Arc<dyn TableSource>,
}

/// Resolves resource paths through the catalog and caches their schemas.
///
/// The cache is a shared immutable map. Readers clone the current `Arc`;
/// writers build a new map and swap it in, so a reader never observes a
/// half-updated cache.
#[derive(Debug)]
pub struct TableManager {
    catalog: Catalog,
    schemas: RwLock<Arc<SchemaMap>>,
}

impl TableManager {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            schemas: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn resolve(&self, path: &ResourcePath) -> Result<Resolved> {
        let key = path.key();
        let source = self
            .catalog
            .lookup(path)
            .ok_or_else(|| StorageError::ResourceNotFound(key.clone()))?;

        if let Some(schema) = self.snapshot().get(&key) {
            return Ok(Resolved {
                path: path.clone(),
                schema: Arc::clone(schema),
                source,
            });
        }

        let schema = Arc::new(source.schema()?);
        tracing::debug!(
            "Resolved {} -> {} ({} columns)",
            key,
            source.describe(),
            schema.column_count()
        );
        self.store(&key, Arc::clone(&schema));

        Ok(Resolved {
            path: path.clone(),
            schema,
            source,
        })
    }

    /// Opens a scan over `resolved`, asking the source to apply `pushed`.
    pub fn rows(&self, resolved: &Resolved, pushed: &FilterExpr) -> Result<Scan> {
        if !pushed.is_empty() {
            tracing::debug!("Pushing '{}' to {}", pushed, resolved.source.describe());
        }
        resolved.source.scan(&resolved.schema, pushed)
    }

    pub fn cached_schema(&self, path: &ResourcePath) -> Option<Arc<Schema>> {
        self.snapshot().get(&path.key()).cloned()
    }

    /// Drops the cached schema of `path`; the next `resolve` re-reads it.
    pub fn invalidate(&self, path: &ResourcePath) {
        let key = path.key();
        self.replace(|map| {
            map.remove(&key);
        });
    }

    pub fn invalidate_all(&self) {
        self.replace(|map| map.clear());
    }

    fn snapshot(&self) -> Arc<SchemaMap> {
        match self.schemas.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn store(&self, key: &str, schema: Arc<Schema>) {
        let key = key.to_string();
        self.replace(|map| {
            map.entry(key).or_insert(schema);
        });
    }

    fn replace(&self, update: impl FnOnce(&mut SchemaMap)) {
        let mut guard = match self.schemas.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = SchemaMap::clone(&guard);
        update(&mut next);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::csv::CsvSource;
    use crate::storage::memory::MemorySource;
    use crate::storage::table::{Column, DataType, Table};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn manager_with_csv(file: &NamedTempFile) -> TableManager {
        let mut catalog = Catalog::new();
        catalog
            .register(
                &ResourcePath::from_path("tabular/test"),
                Arc::new(CsvSource::new(file.path())),
            )
            .unwrap();
        TableManager::new(catalog)
    }

    #[test]
    fn test_unknown_path() {
        let manager = TableManager::new(Catalog::new());
        let err = manager
            .resolve(&ResourcePath::from_path("tabular/missing"))
            .unwrap_err();
        assert!(matches!(err, StorageError::ResourceNotFound(p) if p == "tabular/missing"));
    }

    #[test]
    fn test_schema_is_cached_until_invalidated() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a,b\n1,2\n").unwrap();
        file.flush().unwrap();

        let manager = manager_with_csv(&file);
        let path = ResourcePath::from_path("tabular/test");

        let first = manager.resolve(&path).unwrap();
        assert_eq!(first.schema.column_names(), vec!["a", "b"]);

        std::fs::write(file.path(), "x,y,z\n1,2,3\n").unwrap();
        let second = manager.resolve(&path).unwrap();
        assert!(Arc::ptr_eq(&first.schema, &second.schema));

        manager.invalidate(&path);
        assert!(manager.cached_schema(&path).is_none());
        let third = manager.resolve(&path).unwrap();
        assert_eq!(third.schema.column_names(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_invalidate_all() {
        let schema = Schema::new(vec![Column::new("n", DataType::Integer)]);
        let mut catalog = Catalog::new();
        for name in ["mem/a", "mem/b"] {
            catalog
                .register(
                    &ResourcePath::from_path(name),
                    Arc::new(MemorySource::new(Table::with_rows(name, schema.clone(), Vec::new()))),
                )
                .unwrap();
        }
        let manager = TableManager::new(catalog);

        manager.resolve(&ResourcePath::from_path("mem/a")).unwrap();
        manager.resolve(&ResourcePath::from_path("mem/b")).unwrap();
        manager.invalidate_all();

        assert!(manager.cached_schema(&ResourcePath::from_path("mem/a")).is_none());
        assert!(manager.cached_schema(&ResourcePath::from_path("mem/b")).is_none());
    }

    #[test]
    fn test_manager_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TableManager>();
    }
}
