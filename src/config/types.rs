//! Raw catalog types matching catalog.json.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage kind of a field. Drives value coercion, SQL casts and DDL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Uuid,
    Text,
    Int,
    Float,
    Bool,
    Timestamp,
    /// Arbitrary JSON (arrays, nested objects). Stored verbatim; never filtered or sorted on.
    Json,
}

impl FieldKind {
    pub fn pg_type(self) -> &'static str {
        match self {
            FieldKind::Uuid => "uuid",
            FieldKind::Text => "text",
            FieldKind::Int => "bigint",
            FieldKind::Float => "double precision",
            FieldKind::Bool => "boolean",
            FieldKind::Timestamp => "timestamptz",
            FieldKind::Json => "jsonb",
        }
    }

    pub fn is_scalar(self) -> bool {
        !matches!(self, FieldKind::Json)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Literal value stored when a create body omits the field.
    #[serde(default)]
    pub default: Option<Value>,
    /// Never returned by the API (password hashes, reset tokens).
    #[serde(default)]
    pub hidden: bool,
    /// When false, the field is dropped from create/update bodies.
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub lowercase: bool,
    /// Name of the resource this field points at (informational + validated).
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default)]
    pub validation: ValidationRule,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_key")]
    pub key: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            key: default_search_key(),
            fields: Vec::new(),
        }
    }
}

fn default_search_key() -> String {
    "search".into()
}

/// Related-entity expansion. Exactly one of `local_field` (we hold their id)
/// or `foreign_field` (they hold our id) must be set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExpandConfig {
    pub name: String,
    pub resource: String,
    #[serde(default)]
    pub local_field: Option<String>,
    #[serde(default)]
    pub foreign_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    pub table: String,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub unique_together: Vec<Vec<String>>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default = "default_sort")]
    pub default_sort: String,
    #[serde(default)]
    pub slug_from: Option<String>,
    #[serde(default)]
    pub expand: Vec<ExpandConfig>,
}

fn default_sort() -> String {
    "-createdAt".into()
}

/// All resources in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub resources: Vec<ResourceConfig>,
}
