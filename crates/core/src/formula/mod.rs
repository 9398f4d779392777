//! Safe formula evaluation for characteristic conversions.
//!
//! Conversion formulas arrive from configuration in one of two shapes:
//!
//! - an arithmetic expression string over a fixed variable set, e.g.
//!   `"floor([d] / 10)"`;
//! - a piecewise lookup table, a JSON object of the shape
//!   `{"characteristic": "level", "1": 0, "7": 2, "14": 4}` mapping
//!   thresholds of the named variable to output values.
//!
//! Evaluation is total over the declared variable map (undefined variables
//! read as `0`) and rejects everything outside the closed grammar, so a
//! stored formula cannot execute code or resolve arbitrary identifiers.

mod expr;

use std::collections::{BTreeMap, HashMap};

use expr::{eval, parse, tokenize};

// ── Errors ───────────────────────────────────────────────────────────

/// Errors raised while scanning, parsing, or evaluating a formula.
///
/// These surface only at evaluation time; [`validate`] reports the same
/// conditions as data and never fails.
#[derive(Debug, thiserror::Error)]
pub enum FormulaError {
    #[error("formula syntax error at offset {position}: {detail}")]
    Syntax { position: usize, detail: String },

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("division by zero")]
    DivisionByZero,
}

// ── Public API ───────────────────────────────────────────────────────

/// Evaluate an arithmetic expression against a variable map.
///
/// An absent or blank expression evaluates to `Ok(None)`.
pub fn evaluate(
    expression: Option<&str>,
    variables: &HashMap<String, f64>,
) -> Result<Option<f64>, FormulaError> {
    let expression = match expression {
        Some(e) if !e.trim().is_empty() => e,
        _ => return Ok(None),
    };
    let tokens = tokenize(expression)?;
    let expr = parse(&tokens)?;
    Ok(Some(eval(&expr, variables)?))
}

/// Check an expression against the grammar without evaluating it.
///
/// Returns one message per problem found; an empty list means the
/// expression is well-formed. Blank expressions are well-formed (they
/// evaluate to nothing).
pub fn validate(expression: &str) -> Vec<String> {
    if expression.trim().is_empty() {
        return Vec::new();
    }
    let tokens = match tokenize(expression) {
        Ok(tokens) => tokens,
        Err(e) => return vec![e.to_string()],
    };
    match parse(&tokens) {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    }
}

/// Evaluate `expression` once per integer value of `variable` across
/// `[min, max]`, both endpoints included.
///
/// Swapped bounds are reordered internally, so results are always indexed
/// ascending regardless of argument order. A blank expression yields an
/// empty map.
pub fn evaluate_for_variable_range(
    expression: &str,
    variable: &str,
    min: i64,
    max: i64,
    base_variables: &HashMap<String, f64>,
) -> Result<BTreeMap<i64, f64>, FormulaError> {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let mut results = BTreeMap::new();
    if expression.trim().is_empty() {
        return Ok(results);
    }

    // Parse once, evaluate per value.
    let tokens = tokenize(expression)?;
    let expr = parse(&tokens)?;
    let mut variables = base_variables.clone();
    for value in lo..=hi {
        variables.insert(variable.to_string(), value as f64);
        results.insert(value, eval(&expr, &variables)?);
    }
    Ok(results)
}

// ── Lookup tables ────────────────────────────────────────────────────

/// A piecewise lookup table over one named variable.
///
/// Thresholds are sorted ascending once, at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    /// The variable whose value selects the table entry.
    pub characteristic: String,
    entries: Vec<(i64, f64)>,
}

impl LookupTable {
    /// Build a table from a config object. Returns `None` when the object
    /// has no `characteristic` key (callers fall back to arithmetic mode).
    pub fn from_object(object: &serde_json::Map<String, serde_json::Value>) -> Option<Self> {
        let characteristic = object.get("characteristic")?.as_str()?.to_string();
        let mut entries: Vec<(i64, f64)> = object
            .iter()
            .filter(|(key, _)| key.as_str() != "characteristic")
            .filter_map(|(key, value)| Some((key.parse::<i64>().ok()?, value.as_f64()?)))
            .collect();
        entries.sort_by_key(|(threshold, _)| *threshold);
        Some(Self {
            characteristic,
            entries,
        })
    }

    /// Select the entry with the largest threshold `<= x`; below every
    /// threshold, the lowest-defined entry is the default. Empty tables
    /// yield `None`.
    pub fn lookup(&self, x: f64) -> Option<f64> {
        let mut selected = None;
        for (threshold, value) in &self.entries {
            if (*threshold as f64) <= x {
                selected = Some(*value);
            } else {
                break;
            }
        }
        selected.or_else(|| self.entries.first().map(|(_, v)| *v))
    }
}

// ── Conversion formulas ──────────────────────────────────────────────

/// A stored conversion formula: either an arithmetic expression or a
/// piecewise lookup table.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionFormula {
    Expression(String),
    Table(LookupTable),
}

impl ConversionFormula {
    /// Classify a stored JSON value.
    ///
    /// Strings are expressions. Objects carrying a `characteristic` key are
    /// lookup tables; objects without one fall back to arithmetic-mode
    /// parsing of their textual form (and fail at evaluation time if that
    /// text is not a valid expression).
    pub fn from_value(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Expression(s.clone()),
            serde_json::Value::Object(object) => match LookupTable::from_object(object) {
                Some(table) => Self::Table(table),
                None => Self::Expression(value.to_string()),
            },
            other => Self::Expression(other.to_string()),
        }
    }

    /// Evaluate against a variable map. Expression mode treats blank
    /// expressions as `None`; table mode reads the named variable
    /// (defaulting to `0`) and performs the piecewise lookup.
    pub fn evaluate(
        &self,
        variables: &HashMap<String, f64>,
    ) -> Result<Option<f64>, FormulaError> {
        match self {
            Self::Expression(expression) => evaluate(Some(expression), variables),
            Self::Table(table) => {
                let x = variables
                    .get(&table.characteristic)
                    .copied()
                    .unwrap_or(0.0);
                Ok(table.lookup(x))
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
