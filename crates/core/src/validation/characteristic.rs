//! Characteristic definitions and validation result types.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage type of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacteristicType {
    Int,
    Array,
    String,
}

impl CharacteristicType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Array => "array",
            Self::String => "string",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "int" => Some(Self::Int),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            _ => None,
        }
    }
}

impl std::fmt::Display for CharacteristicType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-entity numeric/enum constraints for one characteristic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityLimits {
    pub min: Option<i64>,
    pub max: Option<i64>,
    #[serde(default)]
    pub required: bool,
    /// Custom out-of-range message; `:min` and `:max` placeholders are
    /// substituted with the resolved bounds.
    pub validation_message: Option<String>,
    /// Allowed values for `array`-typed characteristics.
    pub value_available: Option<Vec<Value>>,
}

/// One characteristic of the target ruleset, with its constraints per
/// entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacteristicDefinition {
    /// Characteristic id, e.g. `level`.
    pub id: String,
    /// Storage column the characteristic maps to, e.g. `level_value`.
    pub db_column: String,
    pub kind: CharacteristicType,
    /// Entity types the characteristic applies to.
    pub applies_to: BTreeSet<String>,
    /// Constraint sets keyed by entity type.
    pub per_entity: BTreeMap<String, EntityLimits>,
}

impl CharacteristicDefinition {
    pub fn limits_for(&self, entity: &str) -> Option<&EntityLimits> {
        self.per_entity.get(entity)
    }
}

/// The full characteristic catalog, keyed by characteristic id.
pub type CharacteristicCatalog = BTreeMap<String, CharacteristicDefinition>;

/// Look up a definition by its id or by its storage column.
pub fn find_definition<'a>(
    catalog: &'a CharacteristicCatalog,
    key: &str,
) -> Option<&'a CharacteristicDefinition> {
    catalog
        .get(key)
        .or_else(|| catalog.values().find(|def| def.db_column == key))
}

/// A single field-level violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

/// Aggregated result of validating one converted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}
