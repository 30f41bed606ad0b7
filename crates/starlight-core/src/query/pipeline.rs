//! ============================================================================
//! Query Pipeline - search → filter → sort
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::special_note_phrases;
use crate::rarity::RarityOrder;
use crate::types::{FilterSelection, Item, SPECIAL_NOTES_FIELD};

/// Search term plus field filters, as supplied by the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub search_term: String,
    pub filters: FilterSelection,
}

impl CatalogQuery {
    pub fn new(search_term: impl Into<String>, filters: FilterSelection) -> Self {
        Self {
            search_term: search_term.into(),
            filters,
        }
    }

    /// Run the full pipeline. Recomputed from scratch on every call.
    pub fn run<'a>(&self, items: &'a [Item], rarity_order: &RarityOrder) -> Vec<&'a Item> {
        let found = search(items, &self.search_term);
        let filtered = apply_filters(found, &self.filters);
        sort(filtered, rarity_order)
    }
}

/// Case-insensitive substring match against `Name`. An empty term keeps
/// every item.
pub fn search<'a, I>(items: I, term: &str) -> Vec<&'a Item>
where
    I: IntoIterator<Item = &'a Item>,
{
    if term.is_empty() {
        return items.into_iter().collect();
    }

    let needle = term.to_lowercase();
    items
        .into_iter()
        .filter(|item| {
            item.name()
                .map(|name| name.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .collect()
}

/// Keep items that satisfy every active constraint
pub fn apply_filters<'a, I>(items: I, filters: &FilterSelection) -> Vec<&'a Item>
where
    I: IntoIterator<Item = &'a Item>,
{
    if filters.is_empty() {
        return items.into_iter().collect();
    }

    // Lowercase the selections once rather than per item
    let constraints: Vec<(&str, String)> = filters
        .iter()
        .map(|(field, value)| (field, value.to_lowercase()))
        .collect();

    items
        .into_iter()
        .filter(|item| {
            constraints
                .iter()
                .all(|(field, wanted)| field_matches(item, field, wanted))
        })
        .collect()
}

/// `wanted` is already lowercased
fn field_matches(item: &Item, field: &str, wanted: &str) -> bool {
    let Some(value) = item.field_text(field) else {
        return false;
    };

    if field == SPECIAL_NOTES_FIELD {
        special_note_phrases(&value)
            .into_iter()
            .any(|phrase| phrase.to_lowercase() == wanted)
    } else {
        value.to_lowercase() == wanted
    }
}

/// Stable sort by `Type` ascending, then rarity rank ascending.
///
/// Items without a `Type` sort after every typed item; items without a known
/// `Rarity` take `UNKNOWN_RARITY_RANK`.
pub fn sort<'a>(mut items: Vec<&'a Item>, rarity_order: &RarityOrder) -> Vec<&'a Item> {
    // slice::sort_by is stable: ties keep input order
    items.sort_by(|a, b| {
        compare_type(a.item_type(), b.item_type())
            .then_with(|| rarity_order.rank(a.rarity()).cmp(&rarity_order.rank(b.rarity())))
    });
    items
}

fn compare_type(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
