//! Config-driven field mapping from raw source records to model groups.

use serde_json::Value;

use crate::config::EntityConfig;
use crate::formatter::{self, ConvertError, FormatterContext};
use crate::types::ConvertedRecord;

static NULL: Value = Value::Null;

/// Resolve a dot-separated path into a JSON value.
///
/// Numeric segments index arrays. The function is total: an absent
/// segment resolves to `Null`, never an error.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> &'a Value {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment).unwrap_or(&NULL),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .unwrap_or(&NULL),
            _ => &NULL,
        };
    }
    current
}

/// Apply an entity's declared field mappings to one raw record.
///
/// Each mapping extracts the value at `from.path`, runs the declared
/// formatter (or passes the value through unchanged), and writes the
/// result under `to.field` in every model group the field belongs to.
/// Mappings apply in declaration order, so a later mapping targeting the
/// same field wins. The special field name `*` spreads an object-valued
/// result (the resistance converter) into the group.
pub fn map_record(
    raw: &Value,
    config: &EntityConfig,
    ctx: &FormatterContext<'_>,
) -> Result<ConvertedRecord, ConvertError> {
    let mut record = ConvertedRecord::new();

    for mapping in &config.mapping {
        let source = resolve_path(raw, &mapping.from.path);
        for target in &mapping.to {
            let value = match &target.formatter {
                Some(name) => formatter::apply(name, source, &target.args, ctx)?,
                None => source.clone(),
            };
            for group in &target.groups {
                let fields = record.entry(group.clone()).or_default();
                if target.field == "*" {
                    if let Value::Object(map) = &value {
                        for (key, entry) in map {
                            fields.insert(key.clone(), entry.clone());
                        }
                    }
                } else {
                    fields.insert(target.field.clone(), value.clone());
                }
            }
        }
    }

    Ok(record)
}

// ── Tests ────────────────────────────────────────────────────────────
