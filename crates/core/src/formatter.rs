//! Named value formatters applied during field mapping.
//!
//! The registry is a closed set: formatter names declared in entity config
//! resolve through [`Formatter::from_name`], unsupported names fail fast,
//! and [`supports`] makes the set enumerable for tests. Formatters are
//! pure functions of their inputs except the formula-backed ones, which
//! read conversion formulas from an injected [`FormulaBook`] and may read
//! an auxiliary level path from the raw record.

use std::collections::HashMap;

use serde_json::Value;

use crate::formula::{ConversionFormula, FormulaError};
use crate::mapper::resolve_path;
use crate::resistance::{self, ResistanceParams};

// ── Errors ───────────────────────────────────────────────────────────

/// A formatter or formula failure during conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("unsupported formatter '{0}'")]
    UnsupportedFormatter(String),

    #[error("formatter '{name}' failed: {detail}")]
    Formatter { name: String, detail: String },

    #[error("no conversion formula for '{characteristic}' on entity '{entity}'")]
    MissingFormula {
        entity: String,
        characteristic: String,
    },

    #[error("formula evaluation failed: {0}")]
    Formula(#[from] FormulaError),
}

// ── Formula book ─────────────────────────────────────────────────────

/// Conversion formulas keyed by (entity type, characteristic id).
///
/// Loaded from storage by `tome-db` and injected read-only; the registry
/// never mutates it.
#[derive(Debug, Clone, Default)]
pub struct FormulaBook {
    formulas: HashMap<(String, String), ConversionFormula>,
}

impl FormulaBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: &str, characteristic: &str, formula: ConversionFormula) {
        self.formulas
            .insert((entity.to_string(), characteristic.to_string()), formula);
    }

    pub fn get(&self, entity: &str, characteristic: &str) -> Option<&ConversionFormula> {
        self.formulas
            .get(&(entity.to_string(), characteristic.to_string()))
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}

/// Read-only context handed to every formatter invocation.
pub struct FormatterContext<'a> {
    /// Entity type being converted (keys the formula book).
    pub entity: &'a str,
    /// The full raw source record, for formatters that read auxiliary
    /// paths (derived level, resistance grades).
    pub raw: &'a Value,
    /// Source default language for localized fields.
    pub language: &'a str,
    pub formulas: &'a FormulaBook,
}

// ── Registry ─────────────────────────────────────────────────────────

/// The closed set of named formatters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// Pick the configured language entry from a localized-string object.
    Lang,
    /// Coerce to integer (non-numeric input becomes `0`).
    Int,
    /// Clamp a number into `[min, max]` from args.
    Clamp,
    /// Truncate a string to `max` characters.
    Truncate,
    /// Map a numeric measure to a named size category.
    Size,
    /// Coerce to a boolean flag.
    Flag,
    /// Derive the target level from the source level formula.
    Level,
    /// Derive life points; depends on the already-derived level.
    Life,
    /// Derive initiative; depends on the already-derived level.
    Initiative,
    /// Derive an arbitrary attribute named in args.
    Attribute,
    /// Run the resistance converter; spreads into per-element fields.
    Resistances,
}

impl Formatter {
    /// All registered formatter names.
    pub const ALL: &'static [&'static str] = &[
        "lang",
        "int",
        "clamp",
        "truncate",
        "size",
        "flag",
        "level",
        "life",
        "initiative",
        "attribute",
        "resistances",
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lang" => Some(Self::Lang),
            "int" => Some(Self::Int),
            "clamp" => Some(Self::Clamp),
            "truncate" => Some(Self::Truncate),
            "size" => Some(Self::Size),
            "flag" => Some(Self::Flag),
            "level" => Some(Self::Level),
            "life" => Some(Self::Life),
            "initiative" => Some(Self::Initiative),
            "attribute" => Some(Self::Attribute),
            "resistances" => Some(Self::Resistances),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lang => "lang",
            Self::Int => "int",
            Self::Clamp => "clamp",
            Self::Truncate => "truncate",
            Self::Size => "size",
            Self::Flag => "flag",
            Self::Level => "level",
            Self::Life => "life",
            Self::Initiative => "initiative",
            Self::Attribute => "attribute",
            Self::Resistances => "resistances",
        }
    }
}

/// Whether a formatter name is registered.
pub fn supports(name: &str) -> bool {
    Formatter::from_name(name).is_some()
}

/// Apply a named formatter. Unsupported names fail fast.
pub fn apply(
    name: &str,
    value: &Value,
    args: &Value,
    ctx: &FormatterContext<'_>,
) -> Result<Value, ConvertError> {
    let formatter = Formatter::from_name(name)
        .ok_or_else(|| ConvertError::UnsupportedFormatter(name.to_string()))?;

    match formatter {
        Formatter::Lang => Ok(pick_language(value, ctx.language)),
        Formatter::Int => Ok(Value::from(coerce_i64(value))),
        Formatter::Clamp => {
            let min = args.get("min").and_then(|v| v.as_f64()).unwrap_or(f64::MIN);
            let max = args.get("max").and_then(|v| v.as_f64()).unwrap_or(f64::MAX);
            Ok(Value::from(coerce_f64(value).clamp(min, max) as i64))
        }
        Formatter::Truncate => {
            let max = args.get("max").and_then(|v| v.as_u64()).unwrap_or(255) as usize;
            match value {
                Value::String(s) => Ok(Value::from(s.chars().take(max).collect::<String>())),
                other => Ok(other.clone()),
            }
        }
        Formatter::Size => size_category(value, args),
        Formatter::Flag => Ok(Value::Bool(is_truthy(value))),
        Formatter::Level => {
            let derived = run_formula(ctx, "level", &[("d", coerce_f64(value))])?;
            Ok(number_or_null(derived))
        }
        Formatter::Life => {
            let level = converted_level(args, ctx)?;
            let derived =
                run_formula(ctx, "life", &[("d", coerce_f64(value)), ("level", level)])?;
            Ok(number_or_null(derived))
        }
        Formatter::Initiative => {
            let level = converted_level(args, ctx)?;
            let derived = run_formula(
                ctx,
                "initiative",
                &[("d", coerce_f64(value)), ("level", level)],
            )?;
            Ok(number_or_null(derived))
        }
        Formatter::Attribute => {
            let characteristic = args
                .get("characteristic")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ConvertError::Formatter {
                    name: "attribute".to_string(),
                    detail: "args must name a 'characteristic'".to_string(),
                })?;
            let level = converted_level(args, ctx)?;
            let derived = run_formula(
                ctx,
                characteristic,
                &[("d", coerce_f64(value)), ("level", level)],
            )?;
            Ok(number_or_null(derived))
        }
        Formatter::Resistances => {
            let params = ResistanceParams::from_args(args);
            let fields = resistance::convert(ctx.raw, &params);
            Ok(Value::Object(
                fields.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ))
        }
    }
}

// ── Formula plumbing ─────────────────────────────────────────────────

fn run_formula(
    ctx: &FormatterContext<'_>,
    characteristic: &str,
    variables: &[(&str, f64)],
) -> Result<Option<f64>, ConvertError> {
    let formula = ctx.formulas.get(ctx.entity, characteristic).ok_or_else(|| {
        ConvertError::MissingFormula {
            entity: ctx.entity.to_string(),
            characteristic: characteristic.to_string(),
        }
    })?;
    let variables: HashMap<String, f64> = variables
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();
    Ok(formula.evaluate(&variables)?)
}

/// Resolve the record's target-model level: read the raw level from the
/// auxiliary path (`levelFrom` in args, `level` by default, falling back
/// to the first grade entry) and run it through the entity's level
/// formula. Without a level formula the raw value passes through.
fn converted_level(args: &Value, ctx: &FormatterContext<'_>) -> Result<f64, ConvertError> {
    let path = args.get("levelFrom").and_then(|v| v.as_str());
    let raw_level = match path {
        Some(path) => coerce_f64(resolve_path(ctx.raw, path)),
        None => match resolve_path(ctx.raw, "level") {
            Value::Null => coerce_f64(resolve_path(ctx.raw, "grades.0.level")),
            found => coerce_f64(found),
        },
    };
    match ctx.formulas.get(ctx.entity, "level") {
        Some(formula) => {
            let mut variables = HashMap::new();
            variables.insert("d".to_string(), raw_level);
            Ok(formula.evaluate(&variables)?.unwrap_or(raw_level))
        }
        None => Ok(raw_level),
    }
}

fn number_or_null(value: Option<f64>) -> Value {
    match value {
        Some(n) => Value::from(n as i64),
        None => Value::Null,
    }
}

// ── Coercions ────────────────────────────────────────────────────────

fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    }
}

fn coerce_i64(value: &Value) -> i64 {
    coerce_f64(value) as i64
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}

fn pick_language(value: &Value, language: &str) -> Value {
    match value {
        Value::Object(map) => map
            .get(language)
            .or_else(|| map.get("en"))
            .or_else(|| map.values().next())
            .cloned()
            .unwrap_or(Value::Null),
        other => other.clone(),
    }
}

fn size_category(value: &Value, args: &Value) -> Result<Value, ConvertError> {
    let measure = coerce_f64(value);
    let ranges = args
        .get("ranges")
        .and_then(|r| r.as_array())
        .ok_or_else(|| ConvertError::Formatter {
            name: "size".to_string(),
            detail: "args must declare 'ranges'".to_string(),
        })?;
    for entry in ranges {
        let max = entry.get(0).and_then(|v| v.as_f64());
        let label = entry.get(1).and_then(|v| v.as_str());
        if let (Some(max), Some(label)) = (max, label) {
            if measure <= max {
                return Ok(Value::from(label));
            }
        }
    }
    let default = args
        .get("default")
        .and_then(|v| v.as_str())
        .unwrap_or("colossal");
    Ok(Value::from(default))
}

// ── Tests ────────────────────────────────────────────────────────────
