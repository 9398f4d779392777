//! Row types for the characteristic catalog.

use sqlx::FromRow;

/// One joined row of `characteristics` x `characteristic_limits`.
/// Limit columns are `NULL` for characteristics with no per-entity
/// constraints yet.
#[derive(Debug, Clone, FromRow)]
pub struct CatalogRow {
    pub slug: String,
    pub db_column: String,
    pub kind: String,
    pub entity_type: Option<String>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub required: Option<bool>,
    pub validation_message: Option<String>,
    pub value_available: Option<serde_json::Value>,
}

/// A row from `conversion_formulas`.
#[derive(Debug, Clone, FromRow)]
pub struct ConversionFormulaRow {
    pub entity_type: String,
    pub characteristic: String,
    pub formula: serde_json::Value,
}
