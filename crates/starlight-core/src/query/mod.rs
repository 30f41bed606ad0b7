//! ============================================================================
//! Query Module - Catalog search, filter, sort, and selector options
//! ============================================================================
//! Pure functions over an in-memory item list. Results borrow from the input
//! slice, so the output is always a subsequence of it.
//!
//! ## Pipeline
//! ```text
//! items → search(Name) → apply_filters(AND) → sort(Type, Rarity rank, stable)
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use starlight_core::query::CatalogQuery;
//! use starlight_core::{FilterSelection, RarityOrder};
//!
//! let query = CatalogQuery::new("rifle", FilterSelection::new().with("Rarity", "Rare"));
//! let shown = query.run(&items, &RarityOrder::default());
//! ```
//! ============================================================================

mod options;
mod pipeline;

pub use options::derive_filter_options;
pub use pipeline::{apply_filters, search, sort, CatalogQuery};

/// Split a `Special / Notes` value into its tag phrases.
///
/// `"Accurate (ranged), Tearing"` → `["Accurate", "Tearing"]`. Phrases that
/// are empty after stripping are dropped.
pub fn special_note_phrases(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(|phrase| match phrase.find('(') {
            Some(pos) => &phrase[..pos],
            None => phrase,
        })
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .collect()
}
