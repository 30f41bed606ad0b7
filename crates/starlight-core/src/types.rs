// ============================================================================
// Starlight Catalog Types
// ============================================================================
// Item records, field values, filter selections, and the crate error type.
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Well-known Fields
// ============================================================================

pub const NAME_FIELD: &str = "Name";
pub const TYPE_FIELD: &str = "Type";
pub const RARITY_FIELD: &str = "Rarity";
pub const PRICE_FIELD: &str = "Price";
pub const CLASS_FIELD: &str = "Class";
pub const SPECIAL_NOTES_FIELD: &str = "Special / Notes";
pub const DESCRIPTION_FIELD: &str = "Description";

/// Category meaning "no category filter"
pub const ALL_CATEGORY: &str = "All";

/// Backend sentinel for miscellaneous items
pub const MISC_TYPE: &str = "Misc";

/// Display value the backend sentinel is normalized to
pub const MISCELLANEOUS_TYPE: &str = "Miscellaneous";

// ============================================================================
// Item Records
// ============================================================================

/// A single field value on an item record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    /// True for empty text; numbers are never empty
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Number(_) => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            // f64 Display already drops a zero fraction ("5" not "5.0")
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

/// One catalog entry.
///
/// Serialized flat: `{"id": "...", "Name": "...", "Type": "...", ...}`.
/// Field sets differ by `Type`; only `Name` and `Type` are expected on every
/// record, and even those may be missing in malformed data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    /// Opaque identifier assigned by the backing store
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// Wire shape accepted on input. Anything that is not a string or number is
/// folded into a value the pipeline can still read.
#[derive(Deserialize)]
struct RawItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(flatten)]
    fields: BTreeMap<String, serde_json::Value>,
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawItem::deserialize(deserializer).map(Item::from)
    }
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        let fields = raw
            .fields
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => FieldValue::Text(s),
                    serde_json::Value::Number(n) => match n.as_f64() {
                        Some(n) => FieldValue::Number(n),
                        None => FieldValue::Text(n.to_string()),
                    },
                    serde_json::Value::Bool(b) => FieldValue::Text(b.to_string()),
                    other => FieldValue::Text(other.to_string()),
                };
                Some((key, value))
            })
            .collect();

        Self {
            id: raw.id.unwrap_or_default(),
            fields,
        }
    }
}

impl Item {
    /// Create an empty record with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Stringified field value; `None` when the field is absent
    pub fn field_text(&self, name: &str) -> Option<String> {
        self.fields.get(name).map(|v| v.to_string())
    }

    /// Text of a field, treating empty text the same as absent
    fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.text(NAME_FIELD)
    }

    pub fn item_type(&self) -> Option<&str> {
        self.text(TYPE_FIELD)
    }

    pub fn rarity(&self) -> Option<&str> {
        self.text(RARITY_FIELD)
    }

    pub fn price(&self) -> Option<f64> {
        match self.fields.get(PRICE_FIELD)? {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

// ============================================================================
// Filter Selections
// ============================================================================

/// One entry in a selector control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOption {
    /// Removes the constraint on the field
    ShowAll,
    Value(String),
}

impl FilterOption {
    pub fn label(&self) -> &str {
        match self {
            FilterOption::ShowAll => ALL_CATEGORY,
            FilterOption::Value(v) => v,
        }
    }
}

/// Active field=value constraints chosen by the user.
/// Serialized as a plain field -> value map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterSelection {
    selected: BTreeMap<String, String>,
}

impl<'de> Deserialize<'de> for FilterSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut selection = FilterSelection::new();
        for (field, value) in raw {
            selection.set(field, value);
        }
        Ok(selection)
    }
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `set`
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Select a value for a field. An empty value clears the constraint.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        if value.is_empty() {
            self.selected.remove(&field);
        } else {
            self.selected.insert(field, value);
        }
    }

    /// Apply a selector option to a field
    pub fn select(&mut self, field: impl Into<String>, option: &FilterOption) {
        match option {
            FilterOption::ShowAll => self.clear(&field.into()),
            FilterOption::Value(v) => self.set(field, v.clone()),
        }
    }

    pub fn clear(&mut self, field: &str) {
        self.selected.remove(field);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.selected.get(field).map(String::as_str)
    }

    /// Active constraints; every value is non-empty
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.selected.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error types for the catalog core
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Upstream fetch failed for category '{category}': {message}")]
    Upstream { category: String, message: String },

    #[error("Cache store error: {0}")]
    Store(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
