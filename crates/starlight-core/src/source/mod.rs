//! ============================================================================
//! Source Module - Upstream item store
//! ============================================================================
//! The hosted document store is reached through `ItemSource`. The only
//! bundled backend reads a JSON catalog export from disk.
//! ============================================================================

mod json;

pub use json::JsonCatalogSource;

use async_trait::async_trait;

use crate::types::{CatalogResult, Item, ALL_CATEGORY};

/// Upstream collaborator that produces raw item records per category
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Records whose raw `Type` equals `category`. `All` or an empty
    /// category returns every record. Failures surface as
    /// `CatalogError::Upstream`.
    async fn fetch_by_category(&self, category: &str) -> CatalogResult<Vec<Item>>;
}

/// True when `category` means "no category filter"
pub fn is_all_category(category: &str) -> bool {
    category.is_empty() || category == ALL_CATEGORY
}
