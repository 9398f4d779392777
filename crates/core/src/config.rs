//! Declarative per-source / per-entity collection config.
//!
//! This module has zero I/O: it defines the serde types for the config file
//! format plus structural validation over raw JSON values. File loading and
//! identity checks against the requested source/entity ids live in
//! `tome-pipeline::config`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────

/// Placeholder substituted with the record id in single-item endpoints.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Placeholder substituted with the source's default language in
/// query-default values.
pub const LANG_PLACEHOLDER: &str = "{lang}";

// ── Source config ────────────────────────────────────────────────────

/// Per-source configuration, loaded once and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Identity of the source; must match the file's lookup key.
    pub source: String,
    /// Base HTTP URL of the game-data API, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Language picked for localized fields, e.g. `fr`.
    pub default_language: String,
}

// ── Entity config ────────────────────────────────────────────────────

/// Per-entity configuration: endpoints, supported filters, and the
/// field-mapping table. Adding a new source entity is a config change,
/// not a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    /// Source identity; must match the owning source config.
    pub source: String,
    /// Entity identity; must match the file's lookup key.
    pub entity: String,
    pub endpoints: Endpoints,
    #[serde(default)]
    pub filters: FilterSupport,
    pub mapping: Vec<FieldMapping>,
    #[serde(default)]
    pub meta: EntityMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    /// Single-record endpoint. Optional: when absent, `fetch_one` falls
    /// back to the listing endpoint with an identity filter.
    #[serde(default)]
    pub fetch_one: Option<FetchOneEndpoint>,
    pub fetch_many: FetchManyEndpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOneEndpoint {
    /// Path containing an `{id}` placeholder, e.g. `/monsters/{id}`.
    pub path_template: String,
    #[serde(default)]
    pub query_defaults: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchManyEndpoint {
    /// Listing path, e.g. `/monsters`. Mandatory.
    pub path: String,
    #[serde(default)]
    pub query_defaults: BTreeMap<String, String>,
}

/// Filter keys the source endpoint understands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSupport {
    #[serde(default)]
    pub supported: BTreeSet<String>,
}

/// One source-path → target-fields mapping declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub from: SourcePath,
    pub to: Vec<TargetField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePath {
    /// Dot-separated path into the raw record; numeric segments index
    /// arrays (e.g. `grades.0.level`).
    pub path: String,
}

/// One target of a mapping: the model groups the field belongs to, the
/// field name, and an optional named formatter with its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetField {
    /// Model groups the field is declared to belong to; the mapped value
    /// is written into every one of them.
    pub groups: Vec<String>,
    /// Target field name. The special name `*` spreads an object-valued
    /// formatter result (e.g. the resistance converter) into the group.
    pub field: String,
    #[serde(default)]
    pub formatter: Option<String>,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    #[serde(default)]
    pub collect_strategy: CollectStrategy,
    /// Classification-code tracking: which discovery registry to touch and
    /// where in the raw record the code lives.
    #[serde(default)]
    pub classification: Option<ClassificationMeta>,
    /// Catalog-building parameters, used when `collect_strategy` is
    /// `catalog`.
    #[serde(default)]
    pub catalog: Option<CatalogMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationMeta {
    /// Name of the discovery registry table group (e.g. `monster_races`).
    pub registry: String,
    /// Dot-path to the classification code in the raw record.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMeta {
    /// Dot-path of the grouping key.
    pub group_by: String,
    /// Dot-path of the value kept per distinct key (first occurrence wins).
    pub value: String,
}

/// How an entity's collected records are used downstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectStrategy {
    /// Collect, convert, validate, integrate.
    #[default]
    Full,
    /// Build a reference taxonomy from the listing; never integrated.
    Catalog,
}

impl CollectStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Catalog => "catalog",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "catalog" => Some(Self::Catalog),
            _ => None,
        }
    }
}

impl std::fmt::Display for CollectStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

impl FetchOneEndpoint {
    /// Substitute the record id into the path template.
    pub fn render_path(&self, id: i64) -> String {
        self.path_template.replace(ID_PLACEHOLDER, &id.to_string())
    }
}

/// Render query defaults, substituting `{lang}` with the source language.
pub fn render_query_defaults(
    defaults: &BTreeMap<String, String>,
    language: &str,
) -> Vec<(String, String)> {
    defaults
        .iter()
        .map(|(k, v)| (k.clone(), v.replace(LANG_PLACEHOLDER, language)))
        .collect()
}

// ── Structural validation ────────────────────────────────────────────

/// Validate the structure of a raw source-config JSON value.
pub fn validate_source_value(value: &serde_json::Value) -> Result<(), String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "source config must be a JSON object".to_string())?;
    for key in ["source", "baseUrl", "defaultLanguage"] {
        match obj.get(key) {
            Some(v) if v.is_string() => {}
            Some(_) => return Err(format!("source config key '{key}' must be a string")),
            None => return Err(format!("source config is missing '{key}'")),
        }
    }
    Ok(())
}

/// Validate the structure of a raw entity-config JSON value.
///
/// Invariants checked here mirror the loader contract: `endpoints` must be
/// an object with a `fetchMany.path` string, and `mapping` must be a list
/// (possibly empty).
pub fn validate_entity_value(value: &serde_json::Value) -> Result<(), String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "entity config must be a JSON object".to_string())?;

    for key in ["source", "entity"] {
        if !obj.get(key).map(|v| v.is_string()).unwrap_or(false) {
            return Err(format!("entity config is missing string key '{key}'"));
        }
    }

    let endpoints = obj
        .get("endpoints")
        .ok_or_else(|| "entity config is missing 'endpoints'".to_string())?;
    let endpoints = endpoints
        .as_object()
        .ok_or_else(|| "'endpoints' must be a JSON object".to_string())?;

    let fetch_many = endpoints
        .get("fetchMany")
        .ok_or_else(|| "'endpoints.fetchMany' is mandatory".to_string())?;
    if !fetch_many
        .get("path")
        .map(|p| p.is_string())
        .unwrap_or(false)
    {
        return Err("'endpoints.fetchMany.path' must be a string".to_string());
    }

    if let Some(fetch_one) = endpoints.get("fetchOne") {
        let template = fetch_one.get("pathTemplate").and_then(|p| p.as_str());
        match template {
            Some(t) if t.contains(ID_PLACEHOLDER) => {}
            Some(_) => {
                return Err(format!(
                    "'endpoints.fetchOne.pathTemplate' must contain '{ID_PLACEHOLDER}'"
                ))
            }
            None => return Err("'endpoints.fetchOne.pathTemplate' must be a string".to_string()),
        }
    }

    let mapping = obj
        .get("mapping")
        .ok_or_else(|| "entity config is missing 'mapping'".to_string())?;
    let mapping = mapping
        .as_array()
        .ok_or_else(|| "'mapping' must be a list".to_string())?;
    for (i, entry) in mapping.iter().enumerate() {
        let entry = entry
            .as_object()
            .ok_or_else(|| format!("mapping entry {i} must be a JSON object"))?;
        if !entry
            .get("from")
            .and_then(|f| f.get("path"))
            .map(|p| p.is_string())
            .unwrap_or(false)
        {
            return Err(format!("mapping entry {i} is missing 'from.path'"));
        }
        match entry.get("to") {
            Some(to) if to.is_array() => {}
            _ => return Err(format!("mapping entry {i} is missing 'to' list")),
        }
    }

    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────
