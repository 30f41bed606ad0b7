//! ============================================================================
//! Filter Options - Selector values derived from the unfiltered catalog
//! ============================================================================

use std::collections::BTreeSet;

use super::special_note_phrases;
use crate::types::{FilterOption, Item, CLASS_FIELD, SPECIAL_NOTES_FIELD};

/// Build the option list for a field's selector control.
///
/// Always starts with `FilterOption::ShowAll`. `class_priority` only affects
/// the `Class` field: listed classes come first in that order, the rest
/// follow lexicographically.
pub fn derive_filter_options<'a, I, S>(items: I, field: &str, class_priority: &[S]) -> Vec<FilterOption>
where
    I: IntoIterator<Item = &'a Item>,
    S: AsRef<str>,
{
    let mut values: BTreeSet<String> = BTreeSet::new();

    if field == SPECIAL_NOTES_FIELD {
        for item in items {
            if let Some(notes) = item.field_text(field) {
                values.extend(special_note_phrases(&notes).into_iter().map(str::to_string));
            }
        }
    } else {
        values.extend(
            items
                .into_iter()
                .filter_map(|item| item.field_text(field))
                .filter(|value| !value.is_empty()),
        );
    }

    let ordered = if field == CLASS_FIELD {
        order_by_priority(values, class_priority)
    } else if field == SPECIAL_NOTES_FIELD {
        values.into_iter().collect()
    } else {
        order_numeric_or_lexical(values)
    };

    std::iter::once(FilterOption::ShowAll)
        .chain(ordered.into_iter().map(FilterOption::Value))
        .collect()
}

fn order_by_priority<S: AsRef<str>>(mut values: BTreeSet<String>, priority: &[S]) -> Vec<String> {
    let mut ordered = Vec::with_capacity(values.len());
    for wanted in priority {
        if let Some(value) = values.take(wanted.as_ref()) {
            ordered.push(value);
        }
    }
    ordered.extend(values);
    ordered
}

fn order_numeric_or_lexical(values: BTreeSet<String>) -> Vec<String> {
    let parsed: Option<Vec<(f64, String)>> = values
        .iter()
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|n| (n, v.clone()))
        })
        .collect();

    match parsed {
        Some(mut numbers) => {
            numbers.sort_by(|a, b| a.0.total_cmp(&b.0));
            numbers.into_iter().map(|(_, v)| v).collect()
        }
        None => values.into_iter().collect(),
    }
}
