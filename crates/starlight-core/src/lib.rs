//! ============================================================================
//! STARLIGHT-CORE: Item Catalog Engine
//! ============================================================================
//! This crate handles the data core of the Starlight item catalog:
//! - Query pipeline: name search, field filters, stable Type/Rarity sort
//! - Filter option lists for selector controls
//! - Per-category response cache with TTL over a durable key-value store
//! - Upstream item sources and the embedded redb cache database
//! ============================================================================

pub mod cache;
pub mod config;
pub mod db;
pub mod query;
pub mod rarity;
pub mod source;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use cache::{CacheConfig, CategoryCache};
pub use config::CatalogConfig;
pub use db::RedbCacheStore;
pub use query::CatalogQuery;
pub use rarity::RarityOrder;
pub use source::{ItemSource, JsonCatalogSource};
