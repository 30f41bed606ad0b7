// ============================================================================
// RedbCacheStore — Embedded Cache Database (redb)
// ============================================================================
// Durable storage for category cache entries, surviving across runs.
// Default path: ~/.starlight/catalog.redb (override via STARLIGHT_DB_PATH)
// ============================================================================

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::config::ENV_DB_PATH;
use crate::types::{CatalogError, CatalogResult};

const CACHE: TableDefinition<&str, &str> = TableDefinition::new("cache");

/// Embedded key-value store for the category cache
pub struct RedbCacheStore {
    db: Database,
    path: PathBuf,
}

impl RedbCacheStore {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses STARLIGHT_DB_PATH or ~/.starlight/catalog.redb
    pub fn open(path: Option<&str>) -> CatalogResult<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var(ENV_DB_PATH) {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir()
                .ok_or_else(|| CatalogError::Store("Cannot determine home directory".into()))?;
            let starlight_dir = home.join(".starlight");
            std::fs::create_dir_all(&starlight_dir)
                .map_err(|e| CatalogError::Store(format!("Failed to create .starlight directory: {}", e)))?;
            starlight_dir.join("catalog.redb")
        };

        info!("Opening cache database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| CatalogError::Store(format!("Failed to open database: {}", e)))?;

        // Ensure the table exists by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| CatalogError::Store(format!("Failed to begin write: {}", e)))?;
        {
            let _ = write_txn
                .open_table(CACHE)
                .map_err(|e| CatalogError::Store(format!("Failed to create cache table: {}", e)))?;
        }
        write_txn
            .commit()
            .map_err(|e| CatalogError::Store(format!("Failed to commit init: {}", e)))?;

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CacheStore for RedbCacheStore {
    async fn get(&self, key: &str) -> CatalogResult<Option<String>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CatalogError::Store(format!("Failed to begin read: {}", e)))?;
        let table = read_txn
            .open_table(CACHE)
            .map_err(|e| CatalogError::Store(format!("Failed to open cache table: {}", e)))?;

        let value = table
            .get(key)
            .map_err(|e| CatalogError::Store(format!("Failed to get entry: {}", e)))?
            .map(|v| v.value().to_string());
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> CatalogResult<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CatalogError::Store(format!("Failed to begin write: {}", e)))?;
        {
            let mut table = write_txn
                .open_table(CACHE)
                .map_err(|e| CatalogError::Store(format!("Failed to open cache table: {}", e)))?;
            table
                .insert(key, value)
                .map_err(|e| CatalogError::Store(format!("Failed to insert entry: {}", e)))?;
        }
        write_txn
            .commit()
            .map_err(|e| CatalogError::Store(format!("Failed to commit: {}", e)))?;

        debug!("Stored cache entry: {} ({} bytes)", key, value.len());
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> CatalogResult<bool> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| CatalogError::Store(format!("Failed to begin write: {}", e)))?;
        let removed;
        {
            let mut table = write_txn
                .open_table(CACHE)
                .map_err(|e| CatalogError::Store(format!("Failed to open cache table: {}", e)))?;
            removed = table
                .remove(key)
                .map_err(|e| CatalogError::Store(format!("Failed to remove entry: {}", e)))?
                .is_some();
        }
        write_txn
            .commit()
            .map_err(|e| CatalogError::Store(format!("Failed to commit delete: {}", e)))?;

        if removed {
            debug!("Deleted cache entry: {}", key);
        }
        Ok(removed)
    }

    async fn keys(&self) -> CatalogResult<Vec<String>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| CatalogError::Store(format!("Failed to begin read: {}", e)))?;
        let table = read_txn
            .open_table(CACHE)
            .map_err(|e| CatalogError::Store(format!("Failed to open cache table: {}", e)))?;

        let mut keys = Vec::new();
        let iter = table
            .range::<&str>(..)
            .map_err(|e| CatalogError::Store(format!("Failed to iterate entries: {}", e)))?;
        for entry in iter {
            let (key, _value) = entry.map_err(|e| CatalogError::Store(format!("Failed to read entry: {}", e)))?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}
