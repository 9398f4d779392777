//! Validation engine — pure logic, no database access.
//!
//! Checks a converted record against the injected characteristic catalog:
//! required presence, int min/max, and enum membership. Violations are
//! accumulated, never short-circuited, so one pass surfaces everything.

use serde_json::Value;

use super::characteristic::{
    find_definition, CharacteristicCatalog, CharacteristicType, EntityLimits, ValidationError,
    ValidationResult,
};
use crate::types::ConvertedRecord;

/// Entities without a ruleset of their own inherit another entity's
/// constraint set.
pub const ENTITY_ALIASES: &[(&str, &str)] = &[("player", "character"), ("npc", "character")];

/// Legacy compatibility shim: the `life` characteristic is also satisfied
/// by the pre-migration `life_points` key. Exactly this one pairing; do
/// not generalize.
const LEGACY_REQUIRED_ALIAS: (&str, &str) = ("life", "life_points");

/// Resolve an entity alias to the entity whose constraints apply.
pub fn resolve_entity_alias(entity: &str) -> &str {
    ENTITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == entity)
        .map(|(_, target)| *target)
        .unwrap_or(entity)
}

/// Validate a converted record for an entity type.
pub fn validate(
    record: &ConvertedRecord,
    entity: &str,
    catalog: &CharacteristicCatalog,
) -> ValidationResult {
    let entity = resolve_entity_alias(entity);
    let merged = merge_groups(record);
    let mut errors = Vec::new();

    check_required(&merged, entity, catalog, &mut errors);
    check_bounds(&merged, entity, catalog, &mut errors);
    check_enums(record, entity, catalog, &mut errors);

    ValidationResult::from_errors(errors)
}

/// Flatten all model groups into one field map. Groups merge in name
/// order; on key collision the later group wins.
fn merge_groups(record: &ConvertedRecord) -> serde_json::Map<String, Value> {
    let mut merged = serde_json::Map::new();
    for fields in record.values() {
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

fn check_required(
    merged: &serde_json::Map<String, Value>,
    entity: &str,
    catalog: &CharacteristicCatalog,
    errors: &mut Vec<ValidationError>,
) {
    for (id, def) in catalog {
        let Some(limits) = def.limits_for(entity) else {
            continue;
        };
        if !limits.required {
            continue;
        }
        let mut present = merged.contains_key(id) || merged.contains_key(&def.db_column);
        if !present && id == LEGACY_REQUIRED_ALIAS.0 {
            present = merged.contains_key(LEGACY_REQUIRED_ALIAS.1);
        }
        if !present {
            errors.push(ValidationError {
                path: id.clone(),
                message: "required field missing".to_string(),
            });
        }
    }
}

fn check_bounds(
    merged: &serde_json::Map<String, Value>,
    entity: &str,
    catalog: &CharacteristicCatalog,
    errors: &mut Vec<ValidationError>,
) {
    for (key, value) in merged {
        let Some(def) = find_definition(catalog, key) else {
            continue;
        };
        if def.kind != CharacteristicType::Int {
            continue;
        }
        let Some(limits) = def.limits_for(entity) else {
            continue;
        };
        if limits.min.is_none() && limits.max.is_none() {
            continue;
        }
        let actual = coerce_int(value);
        let below = limits.min.map(|min| actual < min).unwrap_or(false);
        let above = limits.max.map(|max| actual > max).unwrap_or(false);
        if below || above {
            errors.push(ValidationError {
                path: def.id.clone(),
                message: bound_message(limits),
            });
        }
    }
}

fn check_enums(
    record: &ConvertedRecord,
    entity: &str,
    catalog: &CharacteristicCatalog,
    errors: &mut Vec<ValidationError>,
) {
    for (group, fields) in record {
        for (key, value) in fields {
            let Some(def) = find_definition(catalog, key) else {
                continue;
            };
            if def.kind != CharacteristicType::Array || !def.applies_to.contains(entity) {
                continue;
            }
            let Some(limits) = def.limits_for(entity) else {
                continue;
            };
            let Some(allowed) = &limits.value_available else {
                continue;
            };
            let occurrences: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                Value::Null => Vec::new(),
                other => vec![other],
            };
            for item in occurrences {
                if !allowed.contains(item) {
                    errors.push(ValidationError {
                        path: format!("{group}.{key}"),
                        message: format!("value {item} is not allowed"),
                    });
                }
            }
        }
    }
}

/// Coerce a field value to an integer; non-numeric input reads as `0`.
fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .or_else(|_| s.trim().parse::<f64>().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Build the out-of-range message, substituting `:min` / `:max` with the
/// resolved bounds. Falls back to a generic message when no custom one is
/// configured.
fn bound_message(limits: &EntityLimits) -> String {
    let template = match (&limits.validation_message, limits.min, limits.max) {
        (Some(custom), _, _) => custom.clone(),
        (None, Some(_), Some(_)) => "must be between :min and :max".to_string(),
        (None, Some(_), None) => "must be at least :min".to_string(),
        (None, None, _) => "must be at most :max".to_string(),
    };
    let template = match limits.min {
        Some(min) => template.replace(":min", &min.to_string()),
        None => template,
    };
    match limits.max {
        Some(max) => template.replace(":max", &max.to_string()),
        None => template,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::characteristic::CharacteristicDefinition;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};

    fn definition(
        id: &str,
        column: &str,
        kind: CharacteristicType,
        entity: &str,
        limits: EntityLimits,
    ) -> CharacteristicDefinition {
        CharacteristicDefinition {
            id: id.to_string(),
            db_column: column.to_string(),
            kind,
            applies_to: BTreeSet::from([entity.to_string()]),
            per_entity: BTreeMap::from([(entity.to_string(), limits)]),
        }
    }

    fn catalog_with(defs: Vec<CharacteristicDefinition>) -> CharacteristicCatalog {
        defs.into_iter().map(|d| (d.id.clone(), d)).collect()
    }

    fn record(group: &str, pairs: &[(&str, Value)]) -> ConvertedRecord {
        let mut fields = serde_json::Map::new();
        for (key, value) in pairs {
            fields.insert(key.to_string(), value.clone());
        }
        ConvertedRecord::from([(group.to_string(), fields)])
    }

    fn required_limits() -> EntityLimits {
        EntityLimits {
            required: true,
            ..Default::default()
        }
    }

    // -- required --

    #[test]
    fn missing_required_field_yields_one_error() {
        let catalog = catalog_with(vec![definition(
            "level",
            "level_value",
            CharacteristicType::Int,
            "monster",
            required_limits(),
        )]);
        let result = validate(&record("creatures", &[]), "monster", &catalog);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "level");
        assert_eq!(result.errors[0].message, "required field missing");
    }

    #[test]
    fn supplying_the_field_removes_the_error() {
        let catalog = catalog_with(vec![definition(
            "level",
            "level_value",
            CharacteristicType::Int,
            "monster",
            required_limits(),
        )]);
        let result = validate(
            &record("creatures", &[("level", json!(5))]),
            "monster",
            &catalog,
        );
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn storage_column_satisfies_required() {
        let catalog = catalog_with(vec![definition(
            "level",
            "level_value",
            CharacteristicType::Int,
            "monster",
            required_limits(),
        )]);
        let result = validate(
            &record("creatures", &[("level_value", json!(5))]),
            "monster",
            &catalog,
        );
        assert!(result.valid);
    }

    #[test]
    fn legacy_life_points_alias_satisfies_life_only() {
        let catalog = catalog_with(vec![
            definition(
                "life",
                "life_value",
                CharacteristicType::Int,
                "monster",
                required_limits(),
            ),
            definition(
                "level",
                "level_value",
                CharacteristicType::Int,
                "monster",
                required_limits(),
            ),
        ]);
        // `life_points` satisfies `life` but nothing else.
        let result = validate(
            &record("creatures", &[("life_points", json!(120))]),
            "monster",
            &catalog,
        );
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "level");
    }

    // -- min/max --

    fn bounded(min: Option<i64>, max: Option<i64>, message: Option<&str>) -> EntityLimits {
        EntityLimits {
            min,
            max,
            validation_message: message.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn out_of_range_uses_default_message_with_bounds() {
        let catalog = catalog_with(vec![definition(
            "level",
            "level_value",
            CharacteristicType::Int,
            "monster",
            bounded(Some(1), Some(20), None),
        )]);
        let result = validate(
            &record("creatures", &[("level", json!(50))]),
            "monster",
            &catalog,
        );
        assert!(!result.valid);
        assert_eq!(result.errors[0].message, "must be between 1 and 20");
    }

    #[test]
    fn custom_message_substitutes_placeholders() {
        let catalog = catalog_with(vec![definition(
            "level",
            "level_value",
            CharacteristicType::Int,
            "monster",
            bounded(Some(1), Some(20), Some("level out of [:min, :max]")),
        )]);
        let result = validate(
            &record("creatures", &[("level", json!(0))]),
            "monster",
            &catalog,
        );
        assert_eq!(result.errors[0].message, "level out of [1, 20]");
    }

    #[test]
    fn value_within_bounds_passes() {
        let catalog = catalog_with(vec![definition(
            "level",
            "level_value",
            CharacteristicType::Int,
            "monster",
            bounded(Some(1), Some(20), None),
        )]);
        let result = validate(
            &record("creatures", &[("level", json!(20))]),
            "monster",
            &catalog,
        );
        assert!(result.valid);
    }

    #[test]
    fn non_numeric_value_coerces_to_zero() {
        let catalog = catalog_with(vec![definition(
            "level",
            "level_value",
            CharacteristicType::Int,
            "monster",
            bounded(Some(1), None, None),
        )]);
        let result = validate(
            &record("creatures", &[("level", json!("not a number"))]),
            "monster",
            &catalog,
        );
        assert!(!result.valid);
        assert_eq!(result.errors[0].message, "must be at least 1");
    }

    // -- enum membership --

    fn enum_limits(values: Vec<Value>) -> EntityLimits {
        EntityLimits {
            value_available: Some(values),
            ..Default::default()
        }
    }

    #[test]
    fn enum_violation_is_scoped_to_group_and_field() {
        let catalog = catalog_with(vec![definition(
            "element",
            "element_kinds",
            CharacteristicType::Array,
            "monster",
            enum_limits(vec![json!("earth"), json!("fire")]),
        )]);
        let result = validate(
            &record("creatures", &[("element", json!(["earth", "void"]))]),
            "monster",
            &catalog,
        );
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "creatures.element");
        assert!(result.errors[0].message.contains("void"));
    }

    #[test]
    fn enum_members_all_allowed_passes() {
        let catalog = catalog_with(vec![definition(
            "element",
            "element_kinds",
            CharacteristicType::Array,
            "monster",
            enum_limits(vec![json!("earth"), json!("fire")]),
        )]);
        let result = validate(
            &record("creatures", &[("element", json!(["earth"]))]),
            "monster",
            &catalog,
        );
        assert!(result.valid);
    }

    // -- aliases, merging, accumulation --

    #[test]
    fn player_inherits_character_constraints() {
        assert_eq!(resolve_entity_alias("player"), "character");
        assert_eq!(resolve_entity_alias("npc"), "character");
        assert_eq!(resolve_entity_alias("monster"), "monster");

        let catalog = catalog_with(vec![definition(
            "level",
            "level_value",
            CharacteristicType::Int,
            "character",
            required_limits(),
        )]);
        let result = validate(&record("creatures", &[]), "player", &catalog);
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "level");
    }

    #[test]
    fn later_group_overwrites_earlier_on_merge() {
        let catalog = catalog_with(vec![definition(
            "level",
            "level_value",
            CharacteristicType::Int,
            "monster",
            bounded(Some(1), Some(20), None),
        )]);
        let mut rec = record("creatures", &[("level", json!(500))]);
        rec.insert(
            "monsters".to_string(),
            record("x", &[("level", json!(5))])["x"].clone(),
        );
        // "monsters" sorts after "creatures", so its in-range value wins.
        let result = validate(&rec, "monster", &catalog);
        assert!(result.valid);
    }

    #[test]
    fn all_violations_surface_in_one_pass() {
        let catalog = catalog_with(vec![
            definition(
                "level",
                "level_value",
                CharacteristicType::Int,
                "monster",
                EntityLimits {
                    required: true,
                    min: Some(1),
                    max: Some(20),
                    ..Default::default()
                },
            ),
            definition(
                "life",
                "life_value",
                CharacteristicType::Int,
                "monster",
                required_limits(),
            ),
        ]);
        let result = validate(
            &record("creatures", &[("level", json!(999))]),
            "monster",
            &catalog,
        );
        // level out of range + life missing, reported together.
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }
}
