//! Document and field value types shared by both stores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single field value as read from either store.
///
/// The database side yields `Text` or `Null` (columns are read as character
/// data); the index side yields whatever JSON type the document holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Raw textual form, `None` for NULL.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Float(f) => Some(f.to_string()),
            FieldValue::Text(s) => Some(s.clone()),
        }
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or(FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => FieldValue::Text(s),
            // Indexers sometimes wrap scalar fields in single-element arrays.
            Value::Array(mut items) if items.len() == 1 => FieldValue::from(items.remove(0)),
            Value::Array(items) if items.is_empty() => FieldValue::Null,
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

static NULL_VALUE: FieldValue = FieldValue::Null;

/// A record from either store, keyed by its numeric id.
///
/// `fields` is keyed by the logical field name from `FieldSpec::name`, so both
/// sides can be compared regardless of column / field naming.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub id: i64,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Field value, treating absent fields as NULL.
    pub fn field(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&NULL_VALUE)
    }
}

/// How a field is normalized before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text: trimmed, line endings unified, HTML entities decoded, empty == NULL.
    #[default]
    Text,
    /// Exact token after trimming (statuses, slugs, emails).
    Keyword,
    /// Date/time in any of the common MySQL / ISO 8601 layouts, compared to the second.
    #[serde(alias = "date")]
    DateTime,
    /// Integer, compared numerically.
    Integer,
}

/// One field compared during content validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Logical name used in reports.
    pub name: String,

    /// Database column (defaults to `name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_column: Option<String>,

    /// Index document field (defaults to `name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_field: Option<String>,

    /// Normalization applied before comparing.
    #[serde(default)]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            primary_column: None,
            index_field: None,
            kind,
        }
    }

    pub fn primary_column(&self) -> &str {
        self.primary_column.as_deref().unwrap_or(&self.name)
    }

    pub fn index_field(&self) -> &str {
        self.index_field.as_deref().unwrap_or(&self.name)
    }
}
