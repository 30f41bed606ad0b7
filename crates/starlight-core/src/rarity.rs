//! ============================================================================
//! Rarity Ordering - Rarity label to display rank
//! ============================================================================
//! Lower rank = rarer = displayed first. Labels missing from the table get
//! `UNKNOWN_RARITY_RANK`, which sorts after every known rarity.
//! ============================================================================

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rank for rarities that are absent or not listed in the table
pub const UNKNOWN_RARITY_RANK: u32 = 100;

/// Starlight rarity tiers, rarest first
const STARLIGHT_RARITIES: [(&str, u32); 8] = [
    ("Artifact", 0),
    ("Legendary", 1),
    ("Exotic", 2),
    ("Epic", 3),
    ("Very Rare", 4),
    ("Rare", 5),
    ("Uncommon", 6),
    ("Common", 7),
];

static DEFAULT_ORDER: Lazy<RarityOrder> = Lazy::new(|| RarityOrder::from_pairs(STARLIGHT_RARITIES));

/// Fixed mapping from rarity label to sort rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityOrder {
    ranks: HashMap<String, u32>,
}

impl RarityOrder {
    /// Build a table from `(label, rank)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            ranks: pairs.into_iter().map(|(label, rank)| (label.into(), rank)).collect(),
        }
    }

    /// Rank of a rarity label; `None` or unlisted labels get the sentinel
    pub fn rank(&self, rarity: Option<&str>) -> u32 {
        rarity
            .and_then(|label| self.ranks.get(label).copied())
            .unwrap_or(UNKNOWN_RARITY_RANK)
    }

    pub fn contains(&self, rarity: &str) -> bool {
        self.ranks.contains_key(rarity)
    }

    /// Known labels in rank order
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<(&str, u32)> = self.ranks.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        labels.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        labels.into_iter().map(|(label, _)| label).collect()
    }
}

impl Default for RarityOrder {
    fn default() -> Self {
        DEFAULT_ORDER.clone()
    }
}
