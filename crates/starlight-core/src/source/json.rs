//! JSON catalog export: a top-level array of flat item records.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::{is_all_category, ItemSource};
use crate::types::{CatalogError, CatalogResult, Item};

/// Item source backed by a JSON file loaded once at startup
#[derive(Debug, Clone)]
pub struct JsonCatalogSource {
    items: Vec<Item>,
    path: Option<PathBuf>,
}

impl JsonCatalogSource {
    /// Load the catalog at `path`. Records without an `id` get a fresh UUID.
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::InvalidCatalog(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut source = Self::from_json(&raw)?;
        source.path = Some(path.to_path_buf());

        info!("Loaded {} catalog items from {}", source.items.len(), path.display());
        Ok(source)
    }

    pub fn from_json(raw: &str) -> CatalogResult<Self> {
        let items: Vec<Item> = serde_json::from_str(raw)
            .map_err(|e| CatalogError::InvalidCatalog(format!("Failed to parse catalog: {}", e)))?;
        Ok(Self::from_items(items))
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        let items = items
            .into_iter()
            .map(|mut item| {
                if item.id.is_empty() {
                    item.id = Uuid::new_v4().to_string();
                }
                item
            })
            .collect();

        Self { items, path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl ItemSource for JsonCatalogSource {
    async fn fetch_by_category(&self, category: &str) -> CatalogResult<Vec<Item>> {
        let items: Vec<Item> = if is_all_category(category) {
            self.items.clone()
        } else {
            self.items
                .iter()
                .filter(|item| item.item_type() == Some(category))
                .cloned()
                .collect()
        };

        debug!("Catalog source returned {} items for '{}'", items.len(), category);
        Ok(items)
    }
}
